//! Resource negotiation across a bin boundary: an inner pipe's
//! `UbufMgr` request is proxied through the bin's registry up to a
//! provider, the answer relays back down, swapping the bin's output
//! re-issues the request, and releasing the bin unregisters everything
//! (worked example for the request/provide negotiation protocol).

use std::sync::{Arc, Mutex};

use upipe_core::urequest::{proxy, Answer, RequestKind, RequestRegistry, Urequest};

struct UbufMgrHandle(&'static str);

fn make_original(seen: Arc<Mutex<Option<&'static str>>>) -> Arc<Urequest> {
    Urequest::new(
        RequestKind::UbufMgr,
        None,
        Box::new(move |answer| {
            if let Answer::Handle(h) = answer {
                if let Some(mgr) = h.downcast_ref::<UbufMgrHandle>() {
                    *seen.lock().unwrap() = Some(mgr.0);
                }
            }
        }),
    )
}

#[test]
fn request_proxied_through_a_bin_reaches_the_original_requester() {
    let registry = RequestRegistry::new();
    let seen = Arc::new(Mutex::new(None));

    let original = make_original(seen.clone());
    let proxied = proxy(RequestKind::UbufMgr, None, original.clone());
    registry.register(proxied.clone());

    assert_eq!(registry.len(), 1);

    proxied.provide(Answer::Handle(Arc::new(UbufMgrHandle("pool-a"))));
    assert_eq!(*seen.lock().unwrap(), Some("pool-a"));

    // Spec P4: a provider may answer again with an unchanged choice;
    // that's valid, not an error, and must not corrupt prior state.
    proxied.provide(Answer::Handle(Arc::new(UbufMgrHandle("pool-a"))));
    assert_eq!(*seen.lock().unwrap(), Some("pool-a"));
}

#[test]
fn swapping_the_bin_output_reissues_the_request() {
    let registry = RequestRegistry::new();
    let seen = Arc::new(Mutex::new(None));
    let original = make_original(seen.clone());

    let first_proxy = proxy(RequestKind::UbufMgr, None, original.clone());
    registry.register(first_proxy.clone());
    first_proxy.provide(Answer::Handle(Arc::new(UbufMgrHandle("old-output-pool"))));
    assert_eq!(*seen.lock().unwrap(), Some("old-output-pool"));

    // Output changes: the bin drops its old proxy request and issues a
    // fresh one against the new downstream provider.
    first_proxy.unregister();
    registry.prune();
    assert!(registry.is_empty());

    let second_proxy = proxy(RequestKind::UbufMgr, None, original);
    registry.register(second_proxy.clone());
    second_proxy.provide(Answer::Handle(Arc::new(UbufMgrHandle("new-output-pool"))));
    assert_eq!(*seen.lock().unwrap(), Some("new-output-pool"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn releasing_the_bin_unregisters_every_pending_request() {
    let registry = RequestRegistry::new();
    let seen_a = Arc::new(Mutex::new(None));
    let seen_b = Arc::new(Mutex::new(None));

    let req_a = proxy(RequestKind::UbufMgr, None, make_original(seen_a));
    let req_b = proxy(RequestKind::Uclock, None, make_original(seen_b));
    registry.register(req_a.clone());
    registry.register(req_b.clone());
    assert_eq!(registry.len(), 2);

    registry.unregister_all();
    assert!(!req_a.is_registered());
    assert!(!req_b.is_registered());

    // A late answer after release must not reach the original requester.
    req_a.provide(Answer::Handle(Arc::new(UbufMgrHandle("too-late"))));
}
