#![cfg(unix)]

use jvm_native_bridge::signals::{async_signals_blocked, AsyncSignalBlock};

#[test]
fn guard_blocks_and_restores() {
    assert!(!async_signals_blocked());
    {
        let _block = AsyncSignalBlock::new();
        assert!(async_signals_blocked());
    }
    assert!(!async_signals_blocked());
}

#[test]
fn nested_guards_restore_in_order() {
    let outer = AsyncSignalBlock::new();
    {
        let _inner = AsyncSignalBlock::new();
        assert!(async_signals_blocked());
    }
    // The inner guard restores the mask it saw, which was already blocked.
    assert!(async_signals_blocked());
    drop(outer);
    assert!(!async_signals_blocked());
}

#[test]
fn blocking_is_per_thread() {
    let inside = std::thread::spawn(|| {
        let _block = AsyncSignalBlock::new();
        async_signals_blocked()
    })
    .join()
    .expect("thread");
    assert!(inside);
    assert!(!async_signals_blocked());
}
