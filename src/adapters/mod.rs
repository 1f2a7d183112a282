//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements                   | Connects to                 |
//! |-----------------|------------------------------|-----------------------------|
//! | `flash_slots`   | SlotStore                    | esp-ota / in-memory slots   |
//! | `log_sink`      | EventSink                    | Serial log output           |
//! | `restart`       | RestartPort                  | esp_restart / process exit  |
//! | `tcp_transport` | StreamListener, ByteStream   | lwIP / host TCP sockets     |
//! | `wifi`          | (ConnectivitySignal writer)  | ESP-IDF WiFi STA            |

pub mod flash_slots;
pub mod log_sink;
pub mod restart;
pub mod tcp_transport;
pub mod wifi;
