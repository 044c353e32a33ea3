//! Identity registry for managed objects.
//!
//! Keeps at most one live managed object per native object. Entries are weak:
//! the store never keeps an object alive, it only lets the scripting side find
//! the existing wrapper for a native id. Wrappers remove their own entry when
//! they drop, which may happen on any thread, so the map is a [`DashMap`].

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use downcast_rs::{DowncastSync, impl_downcast};

use crate::native::NativeId;

/// A managed-runtime object bound to one native object.
pub trait ManagedObject: DowncastSync {
	fn native_id(&self) -> NativeId;

	/// Host-visible type name (e.g. "Session", "Script").
	fn type_name(&self) -> &'static str;
}

impl_downcast!(sync ManagedObject);

/// Thread-safe registry of managed objects by native id.
pub struct ObjectStore {
	objects: DashMap<NativeId, Weak<dyn ManagedObject>>,
}

impl Default for ObjectStore {
	fn default() -> Self {
		Self::new()
	}
}

impl ObjectStore {
	pub fn new() -> Self {
		Self {
			objects: DashMap::new(),
		}
	}

	/// Returns the live object registered for `id`, if it has type `T`.
	pub fn get<T: ManagedObject>(&self, id: NativeId) -> Option<Arc<T>> {
		let weak = self.objects.get(&id).map(|entry| entry.value().clone())?;
		weak.upgrade()?.downcast_arc::<T>().ok()
	}

	/// Returns the live object for `id`, or registers the one built by `create`.
	///
	/// `create` runs without any map lock held.
	pub fn get_or_insert_with<T, F>(&self, id: NativeId, create: F) -> Arc<T>
	where
		T: ManagedObject,
		F: FnOnce() -> Arc<T>,
	{
		if let Some(existing) = self.get::<T>(id) {
			tracing::debug!(%id, kind = existing.type_name(), "Reusing live wrapper");
			return existing;
		}

		let object = create();
		let weak = Arc::downgrade(&object);
		let weak: Weak<dyn ManagedObject> = weak;
		self.objects.insert(id, weak);
		tracing::debug!(%id, kind = object.type_name(), "Registered wrapper");
		object
	}

	/// Drops the entry for `id` if its object is gone.
	///
	/// A live entry registered after the dead one is left untouched.
	pub fn remove_dead(&self, id: NativeId) {
		self.objects
			.remove_if(&id, |_, weak| weak.strong_count() == 0);
	}

	pub fn contains(&self, id: NativeId) -> bool {
		self.objects
			.get(&id)
			.is_some_and(|entry| entry.value().strong_count() > 0)
	}

	/// Number of live registered objects.
	pub fn len(&self) -> usize {
		self.objects
			.iter()
			.filter(|entry| entry.value().strong_count() > 0)
			.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
