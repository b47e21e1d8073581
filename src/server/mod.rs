//! HTTP server
//!
//! One axum router carries every endpoint:
//!
//! | Path          | Handler                         |
//! |---------------|---------------------------------|
//! | `/`, `/health`| liveness text                   |
//! | `/stats`      | JSON counters                   |
//! | `/ws`         | producer ingest (WebSocket)     |
//! | `/stream`     | MJPEG broadcast                 |
//! | `/hls/*`      | encoder output                  |
//! | `/frames/*`   | latest-frame snapshot           |

pub mod config;
pub mod listener;
pub mod routes;
pub mod state;

pub use config::RelayConfig;
pub use listener::{BoundServer, RelayServer};
pub use routes::create_router;
pub use state::AppState;
