//! Async helper bridge.
//!
//! Handlebars helpers run synchronously. An async helper is bridged by a
//! shim that writes a unique placeholder token during the synchronous
//! pass and parks the helper's future in the pending map of the render
//! call that is executing. After the pass, the renderer awaits the parked
//! futures and substitutes the results. Each render call owns its pending
//! map, so concurrent renders against one engine never pick up each
//! other's results, and a render that fails simply drops whatever it
//! parked.
//!
//! The executing render call is identified through a thread-local scope:
//! template execution never yields, so the scope entered right before a
//! synchronous pass is still the active one when a shim fires.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use futures::future::BoxFuture;
use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use regex::Regex;
use serde_json::Value;
use tracing::trace;

/// Boxed async helper function: call-time context in, rendered fragment
/// out.
pub(crate) type AsyncHelperFn = Arc<dyn Fn(Value) -> BoxFuture<'static, String> + Send + Sync>;

/// Futures parked by async helper invocations during one render call,
/// keyed by token id.
pub(crate) type PendingMap = Arc<Mutex<HashMap<u64, BoxFuture<'static, String>>>>;

const TOKEN_PREFIX: &str = "__shoji_async_";

thread_local! {
    static ACTIVE: RefCell<Option<PendingMap>> = const { RefCell::new(None) };
}

/// Marks a pending map as the collector for async helper invocations on
/// the current thread, for the duration of one synchronous render pass.
/// Restores the previous collector on drop.
pub(crate) struct PendingScope {
    previous: Option<PendingMap>,
}

impl PendingScope {
    pub(crate) fn enter(pending: PendingMap) -> Self {
        let previous = ACTIVE.with(|slot| slot.borrow_mut().replace(pending));
        Self { previous }
    }
}

impl Drop for PendingScope {
    fn drop(&mut self) {
        ACTIVE.with(|slot| *slot.borrow_mut() = self.previous.take());
    }
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"__shoji_async_(\d+)__").expect("valid token regex"))
}

/// Placeholder token for the given invocation id.
pub(crate) fn token(id: u64) -> String {
    format!("{}{}__", TOKEN_PREFIX, id)
}

/// Synchronous shim registered in place of an async helper.
pub(crate) struct AsyncHelperShim {
    inner: AsyncHelperFn,
    seq: Arc<AtomicU64>,
}

impl AsyncHelperShim {
    pub(crate) fn new(inner: AsyncHelperFn, seq: Arc<AtomicU64>) -> Self {
        Self { inner, seq }
    }
}

impl HelperDef for AsyncHelperShim {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        // The first parameter is the helper's context; without one, the
        // current template data stands in.
        let value = h
            .param(0)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| ctx.data().clone());

        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        let future = (self.inner)(value);
        let parked = ACTIVE.with(|slot| match slot.borrow().as_ref() {
            Some(pending) => {
                pending.lock().unwrap().insert(id, future);
                true
            }
            None => false,
        });

        if !parked {
            // No render pass is collecting on this thread; nothing could
            // ever substitute the token, so emit nothing.
            return Ok(());
        }

        trace!(id, helper = %h.name(), "parked async helper invocation");
        out.write(&token(id))?;
        Ok(())
    }
}

/// Token ids present in `html`.
pub(crate) fn scan_tokens(html: &str) -> Vec<u64> {
    token_re()
        .captures_iter(html)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// Await the pending futures whose tokens appear in `html` and substitute
/// their results. Guarantees the returned string contains no tokens.
pub(crate) async fn resolve_pending(pending: &PendingMap, mut html: String) -> String {
    loop {
        let ids = scan_tokens(&html);
        if ids.is_empty() {
            return html;
        }

        let mut parked = Vec::new();
        {
            let mut map = pending.lock().unwrap();
            for id in ids {
                if let Some(future) = map.remove(&id) {
                    parked.push((id, future));
                }
            }
        }

        if parked.is_empty() {
            // Token-shaped text with nothing parked for it (a helper
            // result that happened to contain one): strip rather than
            // leak internals into the output.
            return token_re().replace_all(&html, "").into_owned();
        }

        let (ids, futs): (Vec<_>, Vec<_>) = parked.into_iter().unzip();
        let results = futures::future::join_all(futs).await;
        for (id, result) in ids.into_iter().zip(results) {
            html = html.replace(&token(id), &result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_scannable() {
        let html = format!("a {} b {} c", token(3), token(17));
        assert_eq!(scan_tokens(&html), vec![3, 17]);
        assert!(scan_tokens("plain output").is_empty());
    }

    #[test]
    fn scopes_nest_and_restore() {
        let outer = PendingMap::default();
        let inner = PendingMap::default();

        let _a = PendingScope::enter(Arc::clone(&outer));
        {
            let _b = PendingScope::enter(Arc::clone(&inner));
            ACTIVE.with(|slot| {
                let active = slot.borrow();
                assert!(Arc::ptr_eq(active.as_ref().unwrap(), &inner));
            });
        }
        ACTIVE.with(|slot| {
            let active = slot.borrow();
            assert!(Arc::ptr_eq(active.as_ref().unwrap(), &outer));
        });
    }

    #[tokio::test]
    async fn resolves_parked_futures() {
        let pending = PendingMap::default();
        pending
            .lock()
            .unwrap()
            .insert(0, Box::pin(async { "first".to_string() }));
        pending
            .lock()
            .unwrap()
            .insert(1, Box::pin(async { "second".to_string() }));

        let html = format!("<p>{}</p><p>{}</p>", token(0), token(1));
        let resolved = resolve_pending(&pending, html).await;

        assert_eq!(resolved, "<p>first</p><p>second</p>");
        assert!(pending.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn strips_unresolvable_tokens() {
        let pending = PendingMap::default();
        let resolved = resolve_pending(&pending, format!("x{}y", token(9))).await;
        assert_eq!(resolved, "xy");
    }
}
