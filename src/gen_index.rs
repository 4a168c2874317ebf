use std::fmt::Debug;

use smallvec::SmallVec;

/// A stable reference to one slot of a [`GenerationalIndexArray`].
///
/// The generation disambiguates reuses of the same slot: a handle only
/// resolves while the slot still carries the generation the handle was
/// minted with.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationalIndex {
	index: u32,
	generation: u32,
}

impl GenerationalIndex {
	#[inline]
	pub fn index(&self) -> u32 {
		self.index
	}

	#[inline]
	pub fn generation(&self) -> u32 {
		self.generation
	}
}

impl Debug for GenerationalIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}v{}", self.index, self.generation)
	}
}

struct Entry<T> {
	data: Option<T>,
	generation: u32,
}

impl<T: Clone> Clone for Entry<T> {
	fn clone(&self) -> Self {
		Entry {
			data: self.data.clone(),
			generation: self.generation,
		}
	}
}

/// Dense slot storage with generation-checked handles.
///
/// Erased slots go onto a LIFO free list and are handed out again by
/// [`insert`](Self::insert) under a bumped generation, so every handle to the
/// previous occupant goes stale instead of aliasing the new one.
pub struct GenerationalIndexArray<T> {
	entries: Vec<Entry<T>>,
	free: SmallVec<[u32; 8]>,
}

impl<T> Default for GenerationalIndexArray<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Clone> Clone for GenerationalIndexArray<T> {
	fn clone(&self) -> Self {
		GenerationalIndexArray {
			entries: self.entries.clone(),
			free: self.free.clone(),
		}
	}
}

impl<T> GenerationalIndexArray<T> {
	pub fn new() -> Self {
		GenerationalIndexArray {
			entries: Vec::new(),
			free: SmallVec::new(),
		}
	}

	/// Stores `value`, reusing the most recently freed slot if there is one.
	pub fn insert(&mut self, value: T) -> GenerationalIndex {
		match self.free.pop() {
			Some(index) => {
				let entry = &mut self.entries[index as usize];
				debug_assert!(entry.data.is_none());
				entry.data = Some(value);
				GenerationalIndex {
					index,
					generation: entry.generation,
				}
			}
			None => {
				let index = u32::try_from(self.entries.len())
					.unwrap_or_else(|_| panic!("generational index array exceeded u32 capacity"));
				self.entries.push(Entry {
					data: Some(value),
					generation: 0,
				});
				GenerationalIndex {
					index,
					generation: 0,
				}
			}
		}
	}

	/// Removes the value `index` refers to, returning it if the handle was
	/// still live. The slot's generation is bumped so every outstanding
	/// handle to it goes stale, then the slot is queued for reuse.
	pub fn erase(&mut self, index: GenerationalIndex) -> Option<T> {
		let entry = self.entries.get_mut(index.index as usize)?;
		if entry.generation != index.generation || entry.data.is_none() {
			return None;
		}

		let value = entry.data.take();
		entry.generation = match entry.generation.checked_add(1) {
			Some(generation) => generation,
			None => panic!("generation counter overflow at slot {}", index.index),
		};
		self.free.push(index.index);
		value
	}

	pub fn get(&self, index: GenerationalIndex) -> Option<&T> {
		let entry = self.entries.get(index.index as usize)?;
		if entry.generation == index.generation {
			entry.data.as_ref()
		} else {
			None
		}
	}

	pub fn get_mut(&mut self, index: GenerationalIndex) -> Option<&mut T> {
		let entry = self.entries.get_mut(index.index as usize)?;
		if entry.generation == index.generation {
			entry.data.as_mut()
		} else {
			None
		}
	}

	/// Erases every live slot. Entry storage is retained, but all
	/// outstanding handles observe a generation change.
	pub fn clear(&mut self) {
		for entry in 0..self.entries_len() {
			if let Some(index) = self.index_at_entry(entry) {
				self.erase(index);
			}
		}
	}

	/// Number of entries ever allocated, live or vacant.
	#[inline]
	pub fn entries_len(&self) -> usize {
		self.entries.len()
	}

	/// The live handle for entry `entry`, if that slot is occupied.
	pub fn index_at_entry(&self, entry: usize) -> Option<GenerationalIndex> {
		let slot = self.entries.get(entry)?;
		slot.data.as_ref()?;
		Some(GenerationalIndex {
			index: entry as u32,
			generation: slot.generation,
		})
	}
}
