//! HTTP surface: router, handlers, shared state and error responses.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::AppState;

use crate::utils::error::Result;
use std::sync::Arc;
use tokio::net::TcpListener;

/// 在已綁定的 listener 上提供 API，直到程序結束
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("🚀 Listening on http://{}", addr);
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
