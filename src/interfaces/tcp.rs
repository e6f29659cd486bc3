//! TCP front end: one task per connection, one reply per request line.

use super::router::CommandRouter;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::signal;

/// Accepts connections until `shutdown` resolves.
///
/// Connections already being served keep their task and finish on their own.
pub async fn serve(
    listener: TcpListener,
    router: Arc<CommandRouter>,
    shutdown: impl Future<Output = ()>,
) -> std::io::Result<()> {
    tokio::pin!(shutdown);
    tracing::info!(addr = %listener.local_addr()?, "rental desk listening");

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let router = router.clone();
                tokio::spawn(async move {
                    tracing::debug!(%peer, "client connected");
                    let (reader, writer) = socket.into_split();
                    match serve_lines(BufReader::new(reader), writer, &router).await {
                        Ok(()) => tracing::debug!(%peer, "client disconnected"),
                        Err(e) => tracing::error!(%peer, error = %e, "connection failed"),
                    }
                });
            }
        }
    }
}

/// Answers request lines from `reader` on `writer` until end of input.
pub async fn serve_lines<R, W>(reader: R, mut writer: W, router: &CommandRouter) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = router.handle_line(&line).await;
        for out in reply.lines() {
            writer.write_all(out.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.flush().await?;
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::catalog::StoreCatalog;
    use crate::application::engine::RentalEngine;
    use crate::domain::clock::SystemClock;
    use crate::domain::item::Item;
    use crate::domain::ports::{RentalStore, RentalStoreRef};
    use crate::domain::tariff::Tariff;
    use crate::infrastructure::in_memory::InMemoryStore;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn router() -> Arc<CommandRouter> {
        let store = InMemoryStore::new();
        store.register_item(Item::new(1, "Alien")).await.unwrap();
        let store: RentalStoreRef = Arc::new(store);
        let catalog = Arc::new(StoreCatalog::new(store.clone()));
        let engine = RentalEngine::new(
            store,
            catalog.clone(),
            Arc::new(SystemClock),
            Tariff::default(),
        );
        Arc::new(CommandRouter::new(Arc::new(engine), catalog))
    }

    #[tokio::test]
    async fn test_serve_lines_skips_blank_lines() {
        let router = router().await;
        let input: &[u8] = b"RENT;1;42\n\n   \nLIST_FILMS\n";
        let mut output = Vec::new();

        serve_lines(input, &mut output, &router).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text, "RENT_RESULT;OK;10.00\nFILM;1;Alien;RENTED\nEND\n");
    }

    #[tokio::test]
    async fn test_tcp_round_trip_and_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, router().await, async {
            let _ = stopped.await;
        }));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut replies = BufReader::new(reader).lines();

        writer.write_all(b"RENT;1;7\r\n").await.unwrap();
        assert_eq!(
            replies.next_line().await.unwrap().as_deref(),
            Some("RENT_RESULT;OK;10.00")
        );
        writer.write_all(b"RENT;1;8\n").await.unwrap();
        assert_eq!(
            replies.next_line().await.unwrap().as_deref(),
            Some("RENT_RESULT;ITEM_UNAVAILABLE;0.00")
        );

        stop.send(()).unwrap();
        server.await.unwrap().unwrap();
    }
}
