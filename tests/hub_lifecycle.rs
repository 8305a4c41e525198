use std::time::Duration;

use chanhub::{
    Ack, ErrorExt, Hub, HubConfig, Mailbox, RecvError, StatusCode, TryRecvError,
};

const WAIT: Duration = Duration::from_millis(500);

fn start() -> Hub<String> {
    Hub::start(HubConfig::default()).expect("hub must start")
}

async fn recv(mb: &mut Mailbox<String>) -> String {
    mb.recv_timeout(WAIT).await.expect("message expected")
}

async fn wait_live_nodes(
    hub: &Hub<String>,
    expected: u64,
) {
    tokio::time::timeout(WAIT, async {
        while hub.live_nodes() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("live nodes did not reach {expected}"));
}

/// Тест проверяет, что остановка канала останавливает всё поддерево,
/// а следующая подписка создаёт узлы заново.
#[tokio::test]
async fn test_stop_channel_removes_subtree() {
    let hub = start();
    let (sub, mut mb) = hub.mailbox();
    hub.subscribe(&sub, Some("a/b")).await.unwrap();
    assert_eq!(hub.live_nodes(), 3);

    hub.stop_channel("a").unwrap();
    // Подписки поддерева потеряны вместе с узлами.
    hub.publish("lost".to_string(), Some("a/b")).unwrap();

    assert_eq!(hub.subscribe(&sub, Some("a/b")).await, Ok(Ack::Subscribed));
    assert_eq!(hub.stats().nodes_created, 5);
    // Старые `a` и `a/b` завершаются, новые остаются.
    wait_live_nodes(&hub, 3).await;

    hub.publish("fresh".to_string(), Some("a/b")).unwrap();
    assert_eq!(recv(&mut mb).await, "fresh");
    assert_eq!(mb.try_recv(), Err(TryRecvError::Empty));
}

/// Тест проверяет, что подписка сразу после `stop_channel` подтверждается
/// и доставка на канал возобновляется.
#[tokio::test]
async fn test_subscribe_right_after_stop_channel() {
    let hub = start();
    let (sub, mut mb) = hub.mailbox();
    hub.subscribe(&sub, Some("a")).await.unwrap();

    hub.stop_channel("a").unwrap();
    assert_eq!(hub.subscribe(&sub, Some("a")).await, Ok(Ack::Subscribed));

    hub.publish("after stop".to_string(), Some("a")).unwrap();
    assert_eq!(recv(&mut mb).await, "after stop");
    wait_live_nodes(&hub, 2).await;
}

/// Тест проверяет, что остановка канала без узла ничего не создаёт.
#[tokio::test]
async fn test_stop_unknown_channel() {
    let hub = start();
    hub.stop_channel("missing/deep").unwrap();

    let (barrier, _mb) = hub.mailbox();
    hub.subscribe(&barrier, None).await.unwrap();
    assert_eq!(hub.stats().nodes_created, 1);
}

/// Тест проверяет, что остановка одного канала не затрагивает соседей.
#[tokio::test]
async fn test_stop_channel_keeps_siblings() {
    let hub = start();
    let (left, _left_mb) = hub.mailbox();
    let (right, mut right_mb) = hub.mailbox();
    hub.subscribe(&left, Some("p/left")).await.unwrap();
    hub.subscribe(&right, Some("p/right")).await.unwrap();

    hub.stop_channel("p/left").unwrap();
    wait_live_nodes(&hub, 3).await;

    hub.publish("still here".to_string(), Some("p")).unwrap();
    assert_eq!(recv(&mut right_mb).await, "still here");
}

/// Тест проверяет, что `shutdown` останавливает всё дерево: ящики
/// закрываются, когда узлы освобождают дескрипторы подписчиков.
#[tokio::test]
async fn test_shutdown_closes_mailboxes() {
    let hub = start();
    let (sub, mut mb) = hub.mailbox();
    hub.subscribe(&sub, Some("x/y/z")).await.unwrap();
    drop(sub);

    hub.shutdown().await.unwrap();
    assert_eq!(mb.recv_timeout(WAIT).await, Err(RecvError::Closed));
}

#[tokio::test]
async fn test_stop_root_rejected_with_status() {
    let hub = start();
    let err = hub.stop_channel("").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::InvalidChannel);
    assert!(err.status_code().is_client_error());
}
