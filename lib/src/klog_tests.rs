use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::klog::{self, KlogLevel};

static LINES: AtomicU32 = AtomicU32::new(0);

fn counting_backend(_args: fmt::Arguments<'_>) {
    LINES.fetch_add(1, Ordering::Relaxed);
}

#[test]
fn level_gating_filters_lines() {
    klog::klog_register_backend(counting_backend);
    klog::klog_set_level(KlogLevel::Warn);
    assert_eq!(klog::klog_get_level(), KlogLevel::Warn);
    assert!(klog::klog_is_enabled(KlogLevel::Error));
    assert!(!klog::klog_is_enabled(KlogLevel::Debug));

    let before = LINES.load(Ordering::Relaxed);
    crate::klog_debug!("filtered out {}", 1);
    assert_eq!(LINES.load(Ordering::Relaxed), before);
    crate::klog_error!("kept");
    crate::klog_warn!("also kept");
    assert_eq!(LINES.load(Ordering::Relaxed), before + 2);

    klog::klog_set_level(KlogLevel::Info);
}
