//! Binding consumers to record kinds and routing raw events to them.

use fxhash::FxHashMap;

use crate::catalog::{Catalog, RecordKind};
use crate::context::DecodeContext;
use crate::error::{Error, Result};
use crate::record::RecordView;
use crate::{EventHeader, Guid, RawEvent};

pub type Callback = Box<dyn FnMut(&EventHeader, &RecordView, &DecodeContext)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Check each dispatched payload's size against its layout.
    pub validate: bool,
    /// Feed BulkType records into the context's type name history.
    pub track_type_names: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            validate: true,
            track_type_names: true,
        }
    }
}

impl RegistryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn track_type_names(mut self, track_type_names: bool) -> Self {
        self.track_type_names = track_type_names;
        self
    }
}

struct Subscription {
    kind: RecordKind,
    /// Alias provider the kind was also bound under.
    native: Option<Guid>,
    callback: Callback,
}

/// Routes raw events to the callbacks subscribed to their kind.
///
/// A subscription is reachable by `(provider_guid, event_id)`, under the
/// native provider alias too when one is set, and by `(task_guid, opcode)`.
pub struct Registry {
    options: RegistryOptions,
    native_provider: Option<Guid>,
    context: DecodeContext,
    subscriptions: FxHashMap<u64, Subscription>,
    by_event_id: FxHashMap<(Guid, u16), Vec<u64>>,
    by_opcode: FxHashMap<(Guid, u8), Vec<u64>>,
    next_handle: u64,
    unhandled: u64,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

impl Registry {
    pub fn new(options: RegistryOptions) -> Self {
        Self {
            options,
            native_provider: None,
            context: DecodeContext::new(),
            subscriptions: FxHashMap::default(),
            by_event_id: FxHashMap::default(),
            by_opcode: FxHashMap::default(),
            next_handle: 1,
            unhandled: 0,
        }
    }

    /// A registry that also binds subscriptions under `catalog`'s native
    /// provider alias.
    pub fn for_catalog(catalog: &Catalog, options: RegistryOptions) -> Self {
        let mut registry = Self::new(options);
        registry.native_provider = catalog.native_provider();
        registry
    }

    pub fn with_context(mut self, context: DecodeContext) -> Self {
        self.context = context;
        self
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    pub fn context(&self) -> &DecodeContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut DecodeContext {
        &mut self.context
    }

    pub fn into_context(self) -> DecodeContext {
        self.context
    }

    /// Events that matched no subscription.
    pub fn unhandled(&self) -> u64 {
        self.unhandled
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn subscribe(
        &mut self,
        kind: RecordKind,
        callback: impl FnMut(&EventHeader, &RecordView, &DecodeContext) + 'static,
    ) -> SubscriptionHandle {
        self.bind(kind, self.native_provider, Box::new(callback))
    }

    fn bind(
        &mut self,
        kind: RecordKind,
        native: Option<Guid>,
        callback: Callback,
    ) -> SubscriptionHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        for key in event_id_keys(&kind, native) {
            self.by_event_id.entry(key).or_default().push(handle);
        }
        self.by_opcode
            .entry((kind.task_guid, kind.opcode))
            .or_default()
            .push(handle);
        log::trace!("subscribed {} as #{}", kind.event_name, handle);
        self.subscriptions.insert(
            handle,
            Subscription {
                kind,
                native,
                callback,
            },
        );
        SubscriptionHandle(handle)
    }

    /// Subscribes one callback per kind of `catalog` passing `filter`.
    /// Native-provider aliases are covered by the primary kind's binding,
    /// which is made under `catalog`'s native provider whatever this
    /// registry was built for.
    pub fn subscribe_catalog<F>(
        &mut self,
        catalog: &Catalog,
        filter: impl FnMut(&str, &str) -> bool,
        mut make_callback: impl FnMut(&RecordKind) -> F,
    ) -> Vec<SubscriptionHandle>
    where
        F: FnMut(&EventHeader, &RecordView, &DecodeContext) + 'static,
    {
        let alias = catalog.native_provider();
        let native = alias.or(self.native_provider);
        catalog
            .kinds(filter)
            .into_iter()
            .filter(|kind| Some(kind.provider_guid) != alias)
            .map(|kind| {
                let callback = make_callback(&kind);
                self.bind(kind, native, Box::new(callback))
            })
            .collect()
    }

    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<()> {
        let subscription = self
            .subscriptions
            .remove(&handle.0)
            .ok_or(Error::UnknownSubscription(handle.0))?;
        let kind = &subscription.kind;
        for key in event_id_keys(kind, subscription.native) {
            remove_binding(&mut self.by_event_id, key, handle.0);
        }
        remove_binding(&mut self.by_opcode, (kind.task_guid, kind.opcode), handle.0);
        Ok(())
    }

    /// Routes `event` to its subscribers and returns how many were called.
    pub fn dispatch(&mut self, event: &RawEvent) -> usize {
        let header = &event.header;
        if self.options.track_type_names {
            self.context.observe(event);
        }

        let by_id = if header.event_id != crate::ILLEGAL_EVENT_ID {
            self.by_event_id
                .get(&(header.provider_guid, header.event_id))
                .filter(|handles| !handles.is_empty())
        } else {
            None
        };
        let Some(handles) = by_id.or_else(|| {
            self.by_opcode
                .get(&(header.task_guid, header.opcode))
                .filter(|handles| !handles.is_empty())
        }) else {
            log::trace!(
                "no subscription for {} event {} (opcode {} of task {})",
                header.provider_guid,
                header.event_id,
                header.opcode,
                header.task_guid
            );
            self.unhandled += 1;
            return 0;
        };

        let raw = event.raw();
        let mut called = 0;
        for handle in handles {
            let Some(subscription) = self.subscriptions.get_mut(handle) else {
                continue;
            };
            let view = RecordView::new(&subscription.kind, raw);
            if called == 0 && self.options.validate {
                view.validate();
            }
            (subscription.callback)(header, &view, &self.context);
            called += 1;
        }
        called
    }
}

fn event_id_keys(kind: &RecordKind, native: Option<Guid>) -> Vec<(Guid, u16)> {
    if !kind.has_event_id() {
        return Vec::new();
    }
    let mut keys = vec![(kind.provider_guid, kind.event_id)];
    if let Some(native) = native {
        if native != kind.provider_guid {
            keys.push((native, kind.event_id));
        }
    }
    keys
}

fn remove_binding<K: std::hash::Hash + Eq>(map: &mut FxHashMap<K, Vec<u64>>, key: K, handle: u64) {
    if let Some(handles) = map.get_mut(&key) {
        handles.retain(|h| *h != handle);
        if handles.is_empty() {
            map.remove(&key);
        }
    }
}
