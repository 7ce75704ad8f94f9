//! Метрики кодека контролов в формате Prometheus.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Счётчики декодирования (thread-safe, lock-free).
#[derive(Debug, Default)]
pub struct CodecMetrics {
    /// Всего успешно декодированных контролов (включая opaque).
    decoded_total: AtomicU64,
    /// Контролы без зарегистрированного декодера.
    unknown_total: AtomicU64,
    /// Ошибки декодирования (конверт или значение).
    errors_total: AtomicU64,
    /// Декодеры, завершившиеся паникой.
    decoder_panics: AtomicU64,
    /// Per-control decode counts keyed by control name.
    decoded_by_control: DashMap<String, AtomicU64>,
    /// Error counts keyed by `ControlError::kind`.
    errors_by_kind: DashMap<&'static str, AtomicU64>,
}

impl CodecMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn inc_decoded(&self, control: &str) {
        self.decoded_total.fetch_add(1, Ordering::Relaxed);
        self.decoded_by_control
            .entry(control.to_string())
            .or_insert_with(AtomicU64::default)
            .fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_unknown(&self) {
        self.unknown_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Увеличивает счётчик ошибок по виду ошибки.
    #[inline]
    pub fn inc_error(&self, kind: &'static str) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        if kind == "decoder_panic" {
            self.decoder_panics.fetch_add(1, Ordering::Relaxed);
        }
        self.errors_by_kind
            .entry(kind)
            .or_insert_with(AtomicU64::default)
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn decoded_total(&self) -> u64 {
        self.decoded_total.load(Ordering::Relaxed)
    }

    pub fn decoded_count(&self, control: &str) -> u64 {
        self.decoded_by_control
            .get(control)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn unknown_count(&self) -> u64 {
        self.unknown_total.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors_total.load(Ordering::Relaxed)
    }

    pub fn error_kind_count(&self, kind: &str) -> u64 {
        self.errors_by_kind
            .get(kind)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn panic_count(&self) -> u64 {
        self.decoder_panics.load(Ordering::Relaxed)
    }

    /// Рендер метрик в текстовом формате Prometheus (exposition format).
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# HELP ldap_controls_decoded_total Total controls decoded by control type.\n");
        out.push_str("# TYPE ldap_controls_decoded_total counter\n");
        let mut decoded: Vec<(String, u64)> = self
            .decoded_by_control
            .iter()
            .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
            .collect();
        decoded.sort();
        for (control, count) in decoded {
            out.push_str(&format!(
                "ldap_controls_decoded_total{{control=\"{}\"}} {}\n",
                escape_label(&control),
                count
            ));
        }

        out.push_str("# HELP ldap_controls_unknown_total Total controls without a registered decoder.\n");
        out.push_str("# TYPE ldap_controls_unknown_total counter\n");
        out.push_str(&format!("ldap_controls_unknown_total {}\n", self.unknown_count()));

        out.push_str("# HELP ldap_controls_errors_total Total control decode errors by kind.\n");
        out.push_str("# TYPE ldap_controls_errors_total counter\n");
        let mut errors: Vec<(&'static str, u64)> = self
            .errors_by_kind
            .iter()
            .map(|e| (*e.key(), e.value().load(Ordering::Relaxed)))
            .collect();
        errors.sort();
        for (kind, count) in errors {
            out.push_str(&format!("ldap_controls_errors_total{{kind=\"{}\"}} {}\n", kind, count));
        }

        out.push_str("# HELP ldap_controls_decoder_panics_total Total decoder panics caught by the dispatcher.\n");
        out.push_str("# TYPE ldap_controls_decoder_panics_total counter\n");
        out.push_str(&format!("ldap_controls_decoder_panics_total {}\n", self.panic_count()));

        out
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
