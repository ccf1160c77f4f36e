// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn inbox() -> (mpsc::UnboundedSender<Signal>, SignalInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, SignalInbox::new(rx))
}

#[test]
fn messages_come_out_in_arrival_order() {
    let (tx, mut inbox) = inbox();
    inbox.push_message("first");
    tx.send(Signal::Message("second".into())).unwrap();
    tx.send(Signal::Message("third".into())).unwrap();

    assert!(inbox.has_message());
    assert_eq!(inbox.next_message().as_deref(), Some("first"));
    assert_eq!(inbox.next_message().as_deref(), Some("second"));
    assert_eq!(inbox.next_message().as_deref(), Some("third"));
    assert_eq!(inbox.next_message(), None);
}

#[test]
fn cancel_discards_buffered_and_later_messages() {
    let (tx, mut inbox) = inbox();
    tx.send(Signal::Message("hello".into())).unwrap();
    tx.send(Signal::Cancel).unwrap();
    tx.send(Signal::Message("goodbye".into())).unwrap();

    assert!(inbox.cancel_requested());
    assert!(!inbox.has_message());
    assert_eq!(inbox.pending_len(), 0);
}

#[test]
fn cancel_is_sticky() {
    let (tx, mut inbox) = inbox();
    tx.send(Signal::Cancel).unwrap();
    assert!(inbox.cancel_requested());
    assert!(inbox.cancel_requested());
}

#[tokio::test]
async fn wait_returns_false_when_senders_drop() {
    let (tx, mut inbox) = inbox();
    drop(tx);
    assert!(!inbox.wait().await);
    assert!(!inbox.wait().await);
}

#[tokio::test]
async fn wait_accepts_one_signal() {
    let (tx, mut inbox) = inbox();
    tx.send(Signal::Message("later".into())).unwrap();
    assert!(inbox.wait().await);
    assert_eq!(inbox.next_message().as_deref(), Some("later"));
}
