// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write path: index and unindex.
//!
//! # Remote write sequence
//!
//! ```text
//! extract fields (requested indexes only)
//!       │
//!       ├─→ stored body? ── yes ─→ merge → Modify
//!       │                  no ──→ Add
//!       │
//!       ├─→ record PendingOperation in the unit's write buffer
//!       │
//!       └─→ Immediate: write now (+ refresh if auto_flush)
//!           Deferred:  leave queued for commit
//! ```

use tracing::{debug, error};

use crate::backend::{remote_call, Document, DocumentLocation};
use crate::catalog::{CatalogError, Indexable};
use crate::config::{SyncSettings, WritePolicy};
use crate::metrics::{self, LatencyTimer};
use crate::mode::Mode;
use crate::schema;
use crate::transaction::{merge_fields, Action, PendingOperation, UnitOfWork};

use super::{SyncEngine, SyncError};

fn object_uid(object: Option<&dyn Indexable>) -> Option<String> {
    object.and_then(|o| o.uid()).filter(|u| !u.is_empty())
}

/// Legacy record key: the caller's `uid` if given, otherwise the object's
/// own UID.
pub(super) fn catalog_uid(uid: &str, object: Option<&dyn Indexable>) -> Result<String, SyncError> {
    if !uid.is_empty() {
        return Ok(uid.to_string());
    }
    object_uid(object).ok_or(SyncError::UnresolvableUid)
}

/// Remote document key: the object's own UID, falling back to the caller's
/// `uid` for objects without one.
pub(super) fn remote_uid(uid: &str, object: Option<&dyn Indexable>) -> Result<String, SyncError> {
    match object_uid(object) {
        Some(own) => Ok(own),
        None if !uid.is_empty() => Ok(uid.to_string()),
        None => Err(SyncError::UnresolvableUid),
    }
}

/// Call into the legacy catalog with metrics.
pub(super) fn legacy_call<T>(
    operation: &'static str,
    call: impl FnOnce() -> Result<T, CatalogError>,
) -> Result<T, CatalogError> {
    let _timer = LatencyTimer::new("legacy", operation);
    let result = call();
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_operation("legacy", operation, status);
    result
}

impl SyncEngine {
    /// Index an object.
    ///
    /// Empty `index_names` means every registered index. With
    /// `update_metadata`, an object new to the legacy catalog gets a record
    /// slot even when the legacy catalog is otherwise bypassed.
    ///
    /// # Errors
    ///
    /// Legacy and remote write failures are returned, never swallowed.
    #[tracing::instrument(skip(self, uow, object), fields(mode))]
    pub fn index(
        &self,
        uow: &UnitOfWork,
        object: &dyn Indexable,
        uid: &str,
        index_names: &[String],
        update_metadata: bool,
    ) -> Result<(), SyncError> {
        let (mode, settings) = self.current();
        tracing::Span::current().record("mode", mode.as_str());
        metrics::record_mode("index", mode.as_str());

        if mode == Mode::Disable {
            legacy_call("index", || self.catalog.catalog_object(object, uid, index_names, update_metadata))?;
            return Ok(());
        }
        let Some(settings) = settings else {
            return Ok(());
        };

        let key = catalog_uid(uid, Some(object))?;
        let uid = remote_uid(uid, Some(object))?;
        if mode.writes_legacy() {
            legacy_call("index", || self.catalog.catalog_object(object, &key, index_names, update_metadata))?;
        }

        let names = if index_names.is_empty() {
            self.catalog.index_names()
        } else {
            index_names.to_vec()
        };
        let fields = schema::extract_fields(self.catalog.as_ref(), self.mappings.as_ref(), object, &names);

        if update_metadata {
            let rid = match self.catalog.record_id(&key) {
                Some(rid) => rid,
                None => self.catalog.create_record(&key, &format!("/{}", object.path().join("/"))),
            };
            legacy_call("update_metadata", || self.catalog.update_metadata(object, rid))?;
        }

        self.write_remote(uow, &settings, &uid, fields)
    }

    fn write_remote(
        &self,
        uow: &UnitOfWork,
        settings: &SyncSettings,
        uid: &str,
        fields: Document,
    ) -> Result<(), SyncError> {
        let location = self.location();
        let (backend, retry) = self.connection(uow, settings)?;
        uow.with_buffer(|buffer| buffer.register(location.clone(), settings.write_policy));

        match settings.write_policy {
            WritePolicy::Immediate => {
                let previous = remote_call("get", retry, || backend.get_document(&location, uid))?;
                let (action, document) = merge_fields(previous.as_ref(), fields);
                debug!(uid, action = action.as_str(), fields = document.len(), "Writing remote document");
                uow.with_buffer(|buffer| {
                    buffer.append(PendingOperation {
                        action,
                        uid: uid.to_string(),
                        location: location.clone(),
                        previous,
                        document: Some(document.clone()),
                        applied: true,
                        refresh: settings.auto_flush,
                    })
                });
                remote_call("index", retry, || backend.index_document(&location, uid, &document)).map_err(|e| {
                    error!(uid, index = %location.index, error = %e, "Remote index write failed");
                    e
                })?;
                if settings.auto_flush {
                    remote_call("refresh", retry, || backend.refresh(&location.index))?;
                }
            }
            WritePolicy::Deferred => {
                let base = match self.queued_body(uow, &location, uid) {
                    Some(queued) => queued,
                    None => remote_call("get", retry, || backend.get_document(&location, uid))?,
                };
                let (action, document) = merge_fields(base.as_ref(), fields);
                debug!(uid, action = action.as_str(), "Queued remote document");
                uow.with_buffer(|buffer| {
                    buffer.append(PendingOperation {
                        action,
                        uid: uid.to_string(),
                        location,
                        previous: base,
                        document: Some(document),
                        applied: false,
                        refresh: settings.auto_flush,
                    })
                });
            }
        }
        Ok(())
    }

    /// Body a queued operation will leave behind, `None` if nothing is queued.
    fn queued_body(&self, uow: &UnitOfWork, location: &DocumentLocation, uid: &str) -> Option<Option<Document>> {
        uow.with_buffer(|buffer| buffer.pending_body(location, uid).map(|body| body.cloned()))
    }

    /// Queue writes left over from a failed commit into `uow`, so its
    /// commit retries them in their original order.
    ///
    /// # Errors
    ///
    /// Fails if the unit of work cannot open a backend connection.
    pub fn requeue(&self, uow: &UnitOfWork, operations: Vec<PendingOperation>) -> Result<(), SyncError> {
        let Some(location) = operations.first().map(|op| op.location.clone()) else {
            return Ok(());
        };
        let settings = self.settings.current().unwrap_or_default();
        self.connection(uow, &settings)?;

        debug!(unit = %uow.id(), operations = operations.len(), "Requeued writes");
        uow.with_buffer(|buffer| {
            buffer.register(location, WritePolicy::Deferred);
            for mut op in operations {
                op.applied = false;
                buffer.append(op);
            }
        });
        Ok(())
    }

    /// Remove an object from the catalog.
    ///
    /// Unindexing a UID that was never indexed is a no-op in every mode.
    ///
    /// # Errors
    ///
    /// Legacy and remote failures other than "not found" are returned.
    #[tracing::instrument(skip(self, uow, object), fields(mode))]
    pub fn unindex(&self, uow: &UnitOfWork, uid: &str, object: Option<&dyn Indexable>) -> Result<(), SyncError> {
        let (mode, settings) = self.current();
        tracing::Span::current().record("mode", mode.as_str());
        metrics::record_mode("unindex", mode.as_str());

        if mode.writes_legacy() && self.catalog.record_id(uid).is_some() {
            legacy_call("unindex", || self.catalog.uncatalog_object(uid))?;
        }
        if mode == Mode::Disable {
            return Ok(());
        }
        let Some(settings) = settings else {
            return Ok(());
        };

        let uid = remote_uid(uid, object)?;
        let location = self.location();
        let (backend, retry) = self.connection(uow, &settings)?;
        uow.with_buffer(|buffer| buffer.register(location.clone(), settings.write_policy));

        match settings.write_policy {
            WritePolicy::Immediate => {
                let previous = remote_call("get", retry, || backend.get_document(&location, &uid))?;
                if let Some(previous) = previous {
                    uow.with_buffer(|buffer| {
                        buffer.append(PendingOperation {
                            action: Action::Delete,
                            uid: uid.clone(),
                            location: location.clone(),
                            previous: Some(previous),
                            document: None,
                            applied: true,
                            refresh: settings.auto_flush,
                        })
                    });
                }
                match remote_call("delete", retry, || backend.delete_document(&location, &uid)) {
                    Err(e) if e.is_not_found() => debug!(uid = %uid, "Remote document already gone"),
                    Err(e) => {
                        error!(uid = %uid, index = %location.index, error = %e, "Remote delete failed");
                        return Err(e.into());
                    }
                    Ok(()) if settings.auto_flush => {
                        remote_call("refresh", retry, || backend.refresh(&location.index))?;
                    }
                    Ok(()) => {}
                }
            }
            WritePolicy::Deferred => {
                let previous = match self.queued_body(uow, &location, &uid) {
                    Some(None) => return Ok(()),
                    Some(queued) => queued,
                    None => remote_call("get", retry, || backend.get_document(&location, &uid))?,
                };
                if previous.is_none() {
                    return Ok(());
                }
                uow.with_buffer(|buffer| {
                    buffer.append(PendingOperation {
                        action: Action::Delete,
                        uid,
                        location,
                        previous,
                        document: None,
                        applied: false,
                        refresh: settings.auto_flush,
                    })
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ContentObject;

    #[test]
    fn test_catalog_uid_prefers_caller_key() {
        let obj = ContentObject::new("from-object", "/plone/x");
        let anonymous = ContentObject::anonymous("/plone/x");
        assert_eq!(catalog_uid("/plone/x", Some(&obj as &dyn Indexable)).unwrap(), "/plone/x");
        assert_eq!(catalog_uid("", Some(&obj as &dyn Indexable)).unwrap(), "from-object");
        assert!(matches!(
            catalog_uid("", Some(&anonymous as &dyn Indexable)),
            Err(SyncError::UnresolvableUid)
        ));
        assert!(matches!(catalog_uid("", None), Err(SyncError::UnresolvableUid)));
    }

    #[test]
    fn test_remote_uid_prefers_object_uid() {
        let obj = ContentObject::new("from-object", "/plone/x");
        let anonymous = ContentObject::anonymous("/plone/x");
        assert_eq!(remote_uid("/plone/x", Some(&obj as &dyn Indexable)).unwrap(), "from-object");
        assert_eq!(remote_uid("/plone/x", Some(&anonymous as &dyn Indexable)).unwrap(), "/plone/x");
        assert_eq!(remote_uid("doc-1", None).unwrap(), "doc-1");
        assert!(matches!(
            remote_uid("", Some(&anonymous as &dyn Indexable)),
            Err(SyncError::UnresolvableUid)
        ));
    }
}
