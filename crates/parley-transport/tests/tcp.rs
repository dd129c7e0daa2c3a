//! Integration tests for the TCP transport.
//!
//! These tests spin up a real listener and a plain `TcpStream` client to
//! verify that frames actually cross the socket with the expected line
//! framing.

#[cfg(feature = "tcp")]
mod tcp {
    use parley_transport::{Connection, TcpConnection, TcpTransport, Transport, TransportError};
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    /// Binds on an ephemeral port, connects one client, and returns the
    /// server side of that connection with the client stream.
    async fn pair(max_frame_len: Option<usize>) -> (TcpConnection, TcpStream) {
        let mut transport = TcpTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        if let Some(max) = max_frame_len {
            transport = transport.with_max_frame_len(max);
        }
        let addr = transport.local_addr().expect("local addr");

        let (accepted, client) = tokio::join!(transport.accept(), TcpStream::connect(addr));
        (
            accepted.expect("should accept"),
            client.expect("should connect"),
        )
    }

    #[tokio::test]
    async fn test_tcp_accept_and_send_receive() {
        let (server_conn, client) = pair(None).await;

        assert!(server_conn.id().into_inner() > 0);

        let (read_half, mut write_half) = client.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // Replies go out newline-terminated.
        server_conn
            .send("SESSION_START:abc")
            .await
            .expect("send should succeed");
        let line = lines.next_line().await.unwrap().expect("a line");
        assert_eq!(line, "SESSION_START:abc");

        // CRLF is accepted and colons past the header survive.
        write_half
            .write_all(b"MESSAGE:alice:abc:@bob hi: there\r\n")
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, "MESSAGE:alice:abc:@bob hi: there");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_tcp_recv_returns_none_on_client_close() {
        let (server_conn, client) = pair(None).await;

        drop(client);

        let frame = server_conn.recv().await.expect("clean close is not an error");
        assert!(frame.is_none());
    }

    #[tokio::test]
    async fn test_tcp_close_flushes_then_ends_client_stream() {
        let (server_conn, client) = pair(None).await;
        let mut lines = BufReader::new(client).lines();

        server_conn.send("SESSION_END").await.unwrap();
        server_conn.close().await.expect("close should succeed");

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("SESSION_END"));
        assert_eq!(lines.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_oversized_frame_is_recoverable() {
        let (server_conn, mut client) = pair(Some(16)).await;

        client
            .write_all(b"LOGIN:someone-with-a-very-long-name:hash\nLOGIN:a:b\n")
            .await
            .unwrap();

        let err = server_conn.recv().await.expect_err("frame is too long");
        assert!(matches!(err, TransportError::FrameTooLong(16)));
        assert!(err.is_recoverable());

        let next = server_conn.recv().await.unwrap();
        assert_eq!(next.as_deref(), Some("LOGIN:a:b"));
    }
}
