use super::WidgetDescriptor;
use crate::errors::{AppError, AppResult};
use crate::models::{Summary, WidgetConfig};
use chrono::NaiveDate;
use futures_util::future::join_all;
use futures_util::FutureExt;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

static WIDGET_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").expect("valid widget id regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    Uninitialized,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Inserted,
    /// An entry with the same id already existed and was kept.
    Duplicate,
}

struct RegistryInner {
    widgets: IndexMap<String, Arc<WidgetDescriptor>>,
    state: RegistryState,
}

/// Source of truth for which widgets exist. Only `register`/`initialize`
/// mutate it; every read hands out shared handles, never the map itself.
pub struct WidgetRegistry {
    inner: RwLock<RegistryInner>,
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner {
                widgets: IndexMap::new(),
                state: RegistryState::Uninitialized,
            }),
        }
    }

    // Nothing panics while holding the lock, so a poisoned guard is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts `descriptor` unless its id is taken. A collision keeps the
    /// first registration and logs a warning.
    pub fn register(&self, descriptor: WidgetDescriptor) -> AppResult<Registration> {
        validate_descriptor(&descriptor)?;
        let mut inner = self.write();
        Ok(insert(&mut inner, descriptor))
    }

    pub fn get(&self, id: &str) -> Option<Arc<WidgetDescriptor>> {
        self.read().widgets.get(id).cloned()
    }

    /// Registered widgets in registration order.
    pub fn list_all(&self) -> Vec<Arc<WidgetDescriptor>> {
        self.read().widgets.values().cloned().collect()
    }

    pub fn list_configs(&self) -> Vec<WidgetConfig> {
        self.read()
            .widgets
            .values()
            .map(|descriptor| descriptor.config.clone())
            .collect()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.read().widgets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().widgets.is_empty()
    }

    pub fn state(&self) -> RegistryState {
        self.read().state
    }

    /// Registers the whole manifest and moves the registry to `Ready`.
    ///
    /// Calling it again is a no-op. The manifest is validated up front, so an
    /// invalid descriptor leaves the registry untouched.
    pub fn initialize(&self, manifest: impl IntoIterator<Item = WidgetDescriptor>) -> AppResult<()> {
        let mut inner = self.write();
        if inner.state == RegistryState::Ready {
            tracing::debug!("widget registry already initialized");
            return Ok(());
        }

        let manifest: Vec<WidgetDescriptor> = manifest.into_iter().collect();
        for descriptor in &manifest {
            validate_descriptor(descriptor)?;
        }
        for descriptor in manifest {
            insert(&mut inner, descriptor);
        }
        inner.state = RegistryState::Ready;
        tracing::info!(widgets = inner.widgets.len(), "widget registry ready");
        Ok(())
    }

    /// Summaries with data for `date`, one per widget, in registration order.
    ///
    /// Providers run concurrently. A provider that fails, panics or reports a
    /// foreign widget id is logged and treated as having no data.
    pub async fn collect_summaries(&self, date: NaiveDate) -> Vec<Summary> {
        let widgets = self.list_all();
        let results = join_all(widgets.iter().map(|descriptor| {
            AssertUnwindSafe(descriptor.summarize(date)).catch_unwind()
        }))
        .await;

        widgets
            .iter()
            .zip(results)
            .filter_map(|(descriptor, outcome)| match outcome {
                Ok(Ok(summary)) if summary.widget_id != descriptor.id() => {
                    tracing::warn!(
                        widget_id = %descriptor.id(),
                        reported = %summary.widget_id,
                        date = %date,
                        "summary reported a different widget id; ignoring"
                    );
                    None
                }
                Ok(Ok(summary)) => summary.has_data.then_some(summary),
                Ok(Err(error)) => {
                    tracing::warn!(widget_id = %descriptor.id(), date = %date, error = %error, "summary provider failed");
                    None
                }
                Err(_) => {
                    tracing::warn!(widget_id = %descriptor.id(), date = %date, "summary provider panicked");
                    None
                }
            })
            .collect()
    }
}

fn insert(inner: &mut RegistryInner, descriptor: WidgetDescriptor) -> Registration {
    let id = descriptor.id().to_string();
    if inner.widgets.contains_key(&id) {
        tracing::warn!(widget_id = %id, "widget is already registered; keeping the first registration");
        return Registration::Duplicate;
    }
    inner.widgets.insert(id, Arc::new(descriptor));
    Registration::Inserted
}

fn validate_descriptor(descriptor: &WidgetDescriptor) -> AppResult<()> {
    let config = &descriptor.config;
    if !WIDGET_ID_PATTERN.is_match(&config.id) {
        return Err(AppError::Validation(format!("invalid widget id '{}'", config.id)));
    }
    if config.name.trim().is_empty() {
        return Err(AppError::Validation(format!("widget '{}' has no name", config.id)));
    }
    config
        .sizes
        .validate()
        .map_err(|error| AppError::Validation(format!("widget '{}': {}", config.id, error)))
}

#[cfg(test)]
mod tests {
    use super::{Registration, RegistryState, WidgetRegistry};
    use crate::errors::{AppError, AppResult};
    use crate::models::{Summary, WidgetCategory, WidgetConfig, WidgetPanel, WidgetProps, WidgetSizes};
    use crate::widgets::{Widget, WidgetDescriptor};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Barrier;

    enum Behaviour {
        Data,
        Empty,
        Fail,
        Panic,
        ForeignId,
        Delay(u64),
        Rendezvous(Arc<Barrier>),
    }

    struct FakeWidget {
        id: String,
        name: String,
        sizes: WidgetSizes,
        behaviour: Behaviour,
        calls: AtomicUsize,
    }

    impl FakeWidget {
        fn new(id: &str, behaviour: Behaviour) -> Self {
            Self {
                id: id.to_string(),
                name: format!("Fake {}", id),
                sizes: WidgetSizes {
                    min_w: 2,
                    min_h: 2,
                    max_w: Some(6),
                    max_h: Some(6),
                    default_w: 4,
                    default_h: 3,
                },
                behaviour,
                calls: AtomicUsize::new(0),
            }
        }

        fn named(mut self, name: &str) -> Self {
            self.name = name.to_string();
            self
        }

        fn sizes(mut self, sizes: WidgetSizes) -> Self {
            self.sizes = sizes;
            self
        }

        fn summary(&self, has_data: bool) -> Summary {
            Summary {
                widget_id: self.id.clone(),
                primary: format!("{} primary", self.id),
                secondary: None,
                color: self.id.clone(),
                has_data,
            }
        }
    }

    #[async_trait]
    impl Widget for FakeWidget {
        fn config(&self) -> WidgetConfig {
            WidgetConfig {
                id: self.id.clone(),
                name: self.name.clone(),
                description: String::new(),
                icon: "box".to_string(),
                category: WidgetCategory::Other,
                sizes: self.sizes,
            }
        }

        async fn render(&self, props: &WidgetProps) -> AppResult<WidgetPanel> {
            Ok(WidgetPanel {
                widget_id: props.id.clone(),
                title: self.name.clone(),
                lines: Vec::new(),
            })
        }

        async fn summarize(&self, _date: NaiveDate) -> AppResult<Summary> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                Behaviour::Data => Ok(self.summary(true)),
                Behaviour::Empty => Ok(self.summary(false)),
                Behaviour::Fail => Err(AppError::Internal("boom".to_string())),
                Behaviour::Panic => panic!("provider exploded"),
                Behaviour::ForeignId => Ok(Summary {
                    widget_id: "someone-else".to_string(),
                    ..self.summary(true)
                }),
                Behaviour::Delay(ms) => {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                    Ok(self.summary(true))
                }
                Behaviour::Rendezvous(barrier) => {
                    barrier.wait().await;
                    Ok(self.summary(true))
                }
            }
        }
    }

    fn descriptor(widget: FakeWidget) -> WidgetDescriptor {
        WidgetDescriptor::new(Arc::new(widget))
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 4).expect("date")
    }

    fn ids(summaries: &[Summary]) -> Vec<&str> {
        summaries.iter().map(|s| s.widget_id.as_str()).collect()
    }

    #[test]
    fn duplicate_registration_keeps_the_first() {
        let registry = WidgetRegistry::new();
        let first = registry
            .register(descriptor(FakeWidget::new("habits", Behaviour::Data).named("First")))
            .expect("register");
        let second = registry
            .register(descriptor(FakeWidget::new("habits", Behaviour::Data).named("Second")))
            .expect("duplicate is not an error");

        assert_eq!(first, Registration::Inserted);
        assert_eq!(second, Registration::Duplicate);
        let all = registry.list_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].config.name, "First");
        assert_eq!(registry.get("habits").expect("lookup").config.name, "First");
    }

    #[test]
    fn enumeration_follows_insertion_order() {
        let registry = WidgetRegistry::new();
        for id in ["notes", "habits", "mood"] {
            registry.register(descriptor(FakeWidget::new(id, Behaviour::Data))).expect("register");
        }
        let configs: Vec<String> = registry.list_configs().into_iter().map(|c| c.id).collect();
        assert_eq!(configs, vec!["notes", "habits", "mood"]);
        assert!(registry.is_registered("mood"));
        assert!(!registry.is_registered("journal"));
        assert!(registry.get("journal").is_none());
    }

    #[test]
    fn invalid_descriptors_are_rejected() {
        let registry = WidgetRegistry::new();
        let bad_sizes = FakeWidget::new("wide", Behaviour::Data).sizes(WidgetSizes {
            min_w: 5,
            min_h: 1,
            max_w: Some(4),
            max_h: None,
            default_w: 4,
            default_h: 1,
        });
        assert!(matches!(registry.register(descriptor(bad_sizes)), Err(AppError::Validation(_))));
        assert!(registry
            .register(descriptor(FakeWidget::new("Bad Id", Behaviour::Data)))
            .is_err());
        assert!(registry
            .register(descriptor(FakeWidget::new("nameless", Behaviour::Data).named(" ")))
            .is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn initialize_is_idempotent() {
        let registry = WidgetRegistry::new();
        assert_eq!(registry.state(), RegistryState::Uninitialized);

        let manifest = || {
            vec![
                descriptor(FakeWidget::new("a", Behaviour::Data)),
                descriptor(FakeWidget::new("b", Behaviour::Data)),
            ]
        };
        registry.initialize(manifest()).expect("first initialize");
        registry.initialize(manifest()).expect("second initialize");

        assert_eq!(registry.state(), RegistryState::Ready);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn invalid_manifest_leaves_registry_untouched() {
        let registry = WidgetRegistry::new();
        let manifest = vec![
            descriptor(FakeWidget::new("a", Behaviour::Data)),
            descriptor(FakeWidget::new("9lives", Behaviour::Data)),
        ];
        assert!(registry.initialize(manifest).is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.state(), RegistryState::Uninitialized);
    }

    #[test]
    fn widgets_registered_before_initialize_stay_first() {
        let registry = WidgetRegistry::new();
        registry
            .register(descriptor(FakeWidget::new("b", Behaviour::Data).named("early")))
            .expect("register");
        registry
            .initialize(vec![
                descriptor(FakeWidget::new("a", Behaviour::Data)),
                descriptor(FakeWidget::new("b", Behaviour::Data).named("late")),
            ])
            .expect("initialize");
        let names: Vec<String> = registry.list_all().iter().map(|d| d.config.name.clone()).collect();
        assert_eq!(names, vec!["early".to_string(), "Fake a".to_string()]);
    }

    #[tokio::test]
    async fn summaries_without_data_are_filtered() {
        let registry = WidgetRegistry::new();
        registry
            .initialize(vec![
                descriptor(FakeWidget::new("a", Behaviour::Empty)),
                descriptor(FakeWidget::new("b", Behaviour::Data)),
                descriptor(FakeWidget::new("c", Behaviour::Empty)),
            ])
            .expect("initialize");

        let summaries = registry.collect_summaries(date()).await;
        assert_eq!(ids(&summaries), vec!["b"]);
        assert!(summaries.iter().all(|s| s.has_data));
    }

    #[tokio::test]
    async fn results_follow_registration_order_not_completion_order() {
        let registry = WidgetRegistry::new();
        registry
            .initialize(vec![
                descriptor(FakeWidget::new("a", Behaviour::Delay(40))),
                descriptor(FakeWidget::new("b", Behaviour::Delay(20))),
                descriptor(FakeWidget::new("c", Behaviour::Data)),
            ])
            .expect("initialize");

        let summaries = registry.collect_summaries(date()).await;
        assert_eq!(ids(&summaries), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn providers_run_concurrently() {
        let barrier = Arc::new(Barrier::new(3));
        let registry = WidgetRegistry::new();
        registry
            .initialize(vec![
                descriptor(FakeWidget::new("a", Behaviour::Rendezvous(barrier.clone()))),
                descriptor(FakeWidget::new("b", Behaviour::Rendezvous(barrier.clone()))),
                descriptor(FakeWidget::new("c", Behaviour::Rendezvous(barrier))),
            ])
            .expect("initialize");

        // Sequential execution would never get past the barrier.
        let summaries = tokio::time::timeout(Duration::from_secs(5), registry.collect_summaries(date()))
            .await
            .expect("providers overlap");
        assert_eq!(ids(&summaries), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failing_providers_do_not_hide_siblings() {
        let registry = WidgetRegistry::new();
        registry
            .initialize(vec![
                descriptor(FakeWidget::new("a", Behaviour::Data)),
                descriptor(FakeWidget::new("b", Behaviour::Fail)),
                descriptor(FakeWidget::new("c", Behaviour::Data)),
                descriptor(FakeWidget::new("d", Behaviour::Panic)),
                descriptor(FakeWidget::new("e", Behaviour::ForeignId)),
            ])
            .expect("initialize");

        let summaries = registry.collect_summaries(date()).await;
        assert_eq!(ids(&summaries), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn summaries_are_computed_fresh_each_call() {
        let widget = Arc::new(FakeWidget::new("a", Behaviour::Data));
        let registry = WidgetRegistry::new();
        registry
            .initialize(vec![WidgetDescriptor::new(widget.clone())])
            .expect("initialize");

        registry.collect_summaries(date()).await;
        registry.collect_summaries(date()).await;
        assert_eq!(widget.calls.load(Ordering::SeqCst), 2);
    }
}
