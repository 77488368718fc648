use gnssconf::core::batch::{BatchEvent, BatchSender, SAVE_CONFIG_COMMAND};
use gnssconf::core::session::SessionManager;
use gnssconf::core::text::{CommandBatch, LineTerminator};
use gnssconf::core::transport::mock::{MockDevice, MockTransport};
use gnssconf::core::transport::DeviceFilter;
use gnssconf::GnssConfError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Batch transmission tests against the in-memory transport
#[cfg(test)]
mod batch_tests {
    use super::*;

    async fn connected() -> (Arc<SessionManager>, MockDevice) {
        let transport = MockTransport::new();
        let device = transport.device();
        let session = Arc::new(SessionManager::new(Arc::new(transport)));
        let (tx, _rx) = mpsc::unbounded_channel();
        session
            .open(115_200, &DeviceFilter::default(), tx)
            .await
            .expect("mock open");
        (session, device)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<BatchEvent>) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_written_in_order_and_paced() {
        let (session, device) = connected().await;
        let sender = BatchSender::new(Arc::clone(&session));
        let batch = CommandBatch::from_text("# header\nMODE ROVER\n\nGPGGA 1\nSAVE NONE\n");

        let report = sender
            .send_batch(&batch, 2.0, &LineTerminator::CrLf)
            .await
            .unwrap();

        assert_eq!(report.sent, 3);
        assert_eq!(
            device.writes(),
            vec!["MODE ROVER\r\n", "GPGGA 1\r\n", "SAVE NONE\r\n"]
        );

        let times = device.write_times();
        assert_eq!(times[1] - times[0], Duration::from_secs(2));
        assert_eq!(times[2] - times[1], Duration::from_secs(2));
        assert!(!sender.is_sending());
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_report_progress() {
        let (session, _device) = connected().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = BatchSender::new(Arc::clone(&session)).with_events(tx);
        let batch = CommandBatch::from_lines(["A", "B"]);

        sender.send_batch(&batch, 0.0, &LineTerminator::Lf).await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], BatchEvent::Started { total: 2, .. }));
        match &events[2] {
            BatchEvent::CommandSent {
                index, total, wire, ..
            } => {
                assert_eq!((*index, *total), (2, 2));
                assert_eq!(wire, "B\n");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(events[3], BatchEvent::Completed { total: 2 });
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_batch_rejected_without_writes() {
        let (session, device) = connected().await;
        let sender = Arc::new(BatchSender::new(Arc::clone(&session)));
        let batch = CommandBatch::from_lines(["ONE", "TWO", "THREE"]);

        let first = {
            let sender = Arc::clone(&sender);
            let batch = batch.clone();
            tokio::spawn(async move { sender.send_batch(&batch, 1.0, &LineTerminator::CrLf).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sender.is_sending());

        let second = sender
            .send_batch(&CommandBatch::from_lines(["OTHER"]), 0.0, &LineTerminator::CrLf)
            .await;
        assert!(matches!(second, Err(GnssConfError::ConcurrentSendRejected)));

        first.await.unwrap().unwrap();
        assert_eq!(device.writes(), vec!["ONE\r\n", "TWO\r\n", "THREE\r\n"]);
        assert!(!sender.is_sending());
        session.close().await;
    }

    #[tokio::test]
    async fn test_guard_checks() {
        let session = Arc::new(SessionManager::new(Arc::new(MockTransport::new())));
        let sender = BatchSender::new(Arc::clone(&session));
        let batch = CommandBatch::from_lines(["MODE ROVER"]);

        let result = sender.send_batch(&batch, 0.0, &LineTerminator::CrLf).await;
        assert!(matches!(result, Err(GnssConfError::NotConnected)));

        let (tx, _rx) = mpsc::unbounded_channel();
        session.open(115_200, &DeviceFilter::default(), tx).await.unwrap();
        let result = sender
            .send_batch(&CommandBatch::from_text("# only comments\n"), 0.0, &LineTerminator::CrLf)
            .await;
        assert!(matches!(result, Err(GnssConfError::EmptyBatch)));
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_batch_reports_failure() {
        let (session, device) = connected().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = Arc::new(BatchSender::new(Arc::clone(&session)).with_events(tx));
        let batch = CommandBatch::from_lines(["ONE", "TWO", "THREE"]);

        let running = {
            let sender = Arc::clone(&sender);
            tokio::spawn(async move { sender.send_batch(&batch, 1.0, &LineTerminator::CrLf).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.close().await;

        let result = running.await.unwrap();
        assert!(matches!(result, Err(GnssConfError::NotConnected)));
        assert_eq!(device.write_count(), 1);
        assert!(!sender.is_sending());

        let events = drain(&mut rx);
        assert!(matches!(
            events.last(),
            Some(BatchEvent::Failed { index: 2, total: 3, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_batch_reports_failure() {
        let (session, device) = connected().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = BatchSender::new(Arc::clone(&session)).with_events(tx);
        let batch = CommandBatch::from_lines(["ONE", "TWO", "THREE"]);

        let result = sender
            .send_batch_until(
                &batch,
                2.0,
                &LineTerminator::CrLf,
                tokio::time::sleep(Duration::from_secs(3)),
            )
            .await;

        assert!(matches!(result, Err(GnssConfError::Interrupted)));
        assert_eq!(device.writes(), vec!["ONE\r\n", "TWO\r\n"]);
        assert!(!sender.is_sending());

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&BatchEvent::Failed {
                index: 3,
                total: 3,
                error: "Interrupted".to_string(),
            })
        );
        assert!(!events
            .iter()
            .any(|e| matches!(e, BatchEvent::Completed { .. })));
        session.close().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_stops_batch() {
        let (session, device) = connected().await;
        device.fail_writes_after(1);
        let sender = BatchSender::new(Arc::clone(&session));

        let result = sender
            .send_batch(&CommandBatch::from_lines(["ONE", "TWO"]), 0.5, &LineTerminator::CrLf)
            .await;
        assert!(matches!(result, Err(GnssConfError::WriteFailure { .. })));
        assert_eq!(device.writes(), vec!["ONE\r\n"]);
        session.close().await;
    }

    #[tokio::test]
    async fn test_save_config_uses_terminator() {
        let (session, device) = connected().await;
        let sender = BatchSender::new(Arc::clone(&session));

        sender.send_save_config(&LineTerminator::Cr).await.unwrap();
        assert_eq!(device.writes(), vec![format!("{}\r", SAVE_CONFIG_COMMAND)]);

        session.close().await;
        let result = sender.send_save_config(&LineTerminator::Cr).await;
        assert!(matches!(result, Err(GnssConfError::NotConnected)));
    }
}
