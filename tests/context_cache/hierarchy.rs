//! Context hierarchies: parents are loaded first, removal may cascade.

use super::support::{child, config, delegate};
use std::sync::Arc;
use today_test_context::{ContextLoaderDelegate, HierarchyMode};

#[test]
fn parent_is_built_before_child_and_passed_in() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);

    let web_context = delegate.load_context(&web).unwrap();
    let root_context = delegate.load_context(&root).unwrap();

    assert_eq!(root_context.generation, 1);
    assert_eq!(web_context.generation, 2);
    assert!(Arc::ptr_eq(web_context.parent.as_ref().unwrap(), &root_context));
    assert_eq!(loader.loads(), 2);
}

#[test]
fn siblings_share_the_cached_parent() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    let batch = child("BatchConfig", &root);

    let web_context = delegate.load_context(&web).unwrap();
    let batch_context = delegate.load_context(&batch).unwrap();

    assert!(Arc::ptr_eq(
        web_context.parent.as_ref().unwrap(),
        batch_context.parent.as_ref().unwrap()
    ));
    assert_eq!(loader.loads(), 3);
    assert_eq!(delegate.cache().parent_context_count(), 1);
}

#[test]
fn current_level_close_keeps_children() {
    let (delegate, _loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    let web_context = delegate.load_context(&web).unwrap();

    delegate.close_context(&root, HierarchyMode::CurrentLevel);

    assert!(!delegate.is_context_loaded(&root));
    assert!(delegate.is_context_loaded(&web));
    assert!(!web_context.is_closed());
    assert!(web_context.parent.as_ref().unwrap().is_closed());
}

#[test]
fn exhaustive_close_removes_children() {
    let (delegate, _loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    let web_context = delegate.load_context(&web).unwrap();

    delegate.close_context(&root, HierarchyMode::Exhaustive);

    assert!(!delegate.is_context_loaded(&root));
    assert!(!delegate.is_context_loaded(&web));
    assert!(web_context.is_closed());
    assert_eq!(delegate.cache().size(), 0);
    assert_eq!(delegate.cache().parent_context_count(), 0);
}

#[test]
fn exhaustive_close_runs_deepest_first() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let service = child("ServiceConfig", &root);
    let web = child("WebConfig", &service);

    delegate.load_context(&web).unwrap();
    delegate.close_context(&root, HierarchyMode::Exhaustive);

    assert_eq!(loader.closed(), ["WebConfig", "ServiceConfig", "RootConfig"]);
}

#[test]
fn exhaustive_close_reaches_through_a_closed_level() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let service = child("ServiceConfig", &root);
    let web = child("WebConfig", &service);

    delegate.load_context(&web).unwrap();
    delegate.close_context(&service, HierarchyMode::CurrentLevel);
    assert!(delegate.is_context_loaded(&web));

    delegate.close_context(&root, HierarchyMode::Exhaustive);

    assert!(!delegate.is_context_loaded(&web));
    assert!(!delegate.is_context_loaded(&root));
    assert_eq!(loader.closed(), ["ServiceConfig", "WebConfig", "RootConfig"]);
}

#[test]
fn closing_a_child_leaves_the_parent() {
    let (delegate, _loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    delegate.load_context(&web).unwrap();

    delegate.close_context(&web, HierarchyMode::Exhaustive);

    assert!(delegate.is_context_loaded(&root));
    assert!(!delegate.is_context_loaded(&web));
    assert_eq!(delegate.cache().parent_context_count(), 0);
}

#[test]
fn reloading_a_child_after_parent_close_rebuilds_the_parent() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    delegate.load_context(&web).unwrap();

    delegate.close_context(&root, HierarchyMode::Exhaustive);
    let web_context = delegate.load_context(&web).unwrap();

    assert_eq!(loader.loads(), 4);
    assert!(!web_context.parent.as_ref().unwrap().is_closed());
}

#[test]
fn failing_parent_fails_the_child() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    loader.fail_loading("RootConfig");

    let err = delegate.load_context(&web).unwrap_err();

    assert!(err.is_load_failure());
    assert!(!delegate.is_context_loaded(&root));
    assert!(!delegate.is_context_loaded(&web));
    assert_eq!(loader.loads(), 0);
}

#[test]
fn failing_child_keeps_the_loaded_parent() {
    let (delegate, loader) = delegate();
    let root = config("RootConfig");
    let web = child("WebConfig", &root);
    loader.fail_loading("WebConfig");

    assert!(delegate.load_context(&web).is_err());

    assert!(delegate.is_context_loaded(&root));
    assert!(!delegate.is_context_loaded(&web));
    assert_eq!(delegate.cache().parent_context_count(), 0);
}
