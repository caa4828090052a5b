//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on a random port and talk to it through
//! the client side of the same crate.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use readyroom_transport::{
        Connection, Transport, TransportError, WebSocketConnection, WebSocketTransport,
    };

    async fn bound() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport
            .local_addr()
            .expect("should have local addr")
            .to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bound().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let client = WebSocketConnection::connect(&addr)
            .await
            .expect("client should connect");
        let server_conn = server_handle.await.expect("task should complete");

        client.send(b"hello host").await.expect("client send");
        let received = server_conn.recv().await.expect("recv");
        assert_eq!(received, Some(b"hello host".to_vec()));

        server_conn.send(b"hello peer").await.expect("server send");
        let received = client.recv().await.expect("recv");
        assert_eq!(received, Some(b"hello peer".to_vec()));
    }

    #[tokio::test]
    async fn test_websocket_ids_are_distinct_per_connection() {
        let (mut transport, addr) = bound().await;

        let server_handle = tokio::spawn(async move {
            let a = transport.accept().await.expect("accept a");
            let b = transport.accept().await.expect("accept b");
            (a, b)
        });

        let _c1 = WebSocketConnection::connect(&addr).await.expect("c1");
        let _c2 = WebSocketConnection::connect(&addr).await.expect("c2");
        let (a, b) = server_handle.await.expect("task");

        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_is_pending() {
        // A reader parked in recv() must not block a concurrent send.
        let (mut transport, addr) = bound().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let client = WebSocketConnection::connect(&addr).await.expect("connect");
        let server_conn =
            std::sync::Arc::new(server_handle.await.expect("task"));

        let reader = {
            let conn = std::sync::Arc::clone(&server_conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        server_conn.send(b"push").await.expect("send while reading");
        assert_eq!(client.recv().await.expect("recv"), Some(b"push".to_vec()));

        client.send(b"reply").await.expect("reply");
        let got = reader.await.expect("join").expect("recv");
        assert_eq!(got, Some(b"reply".to_vec()));
    }

    #[tokio::test]
    async fn test_websocket_close_yields_none() {
        let (mut transport, addr) = bound().await;

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let client = WebSocketConnection::connect(&addr).await.expect("connect");
        let server_conn = server_handle.await.expect("task");

        client.close().await.expect("close");
        let result = server_conn.recv().await.expect("recv after close");
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_upgrade_of_silent_socket_times_out() {
        let (mut transport, addr) = bound().await;
        let _silent = tokio::net::TcpStream::connect(&addr).await.expect("tcp connect");

        let incoming = transport.accept_incoming().await.expect("tcp accept");
        let result = incoming.upgrade(Duration::from_millis(100)).await;
        assert!(matches!(result, Err(TransportError::AcceptFailed(_))));
    }

    #[tokio::test]
    async fn test_silent_socket_does_not_hold_up_next_accept() {
        let (mut transport, addr) = bound().await;
        let _silent = tokio::net::TcpStream::connect(&addr).await.expect("tcp connect");
        let stalled = transport.accept_incoming().await.expect("tcp accept");
        let stalled = tokio::spawn(stalled.upgrade(Duration::from_secs(30)));

        let server_handle = tokio::spawn(async move {
            let incoming = transport.accept_incoming().await.expect("tcp accept");
            incoming.upgrade(Duration::from_secs(2)).await.expect("upgrade")
        });
        let client = WebSocketConnection::connect(&addr).await.expect("connect");
        let server_conn = tokio::time::timeout(Duration::from_secs(2), server_handle)
            .await
            .expect("second client accepted in time")
            .expect("task");

        client.send(b"still here").await.expect("send");
        assert_eq!(
            server_conn.recv().await.expect("recv"),
            Some(b"still here".to_vec())
        );
        stalled.abort();
    }

    #[tokio::test]
    async fn test_websocket_connect_to_nothing_fails() {
        let (transport, addr) = bound().await;
        drop(transport);

        let result = WebSocketConnection::connect(&addr).await;
        assert!(result.is_err());
    }
}
