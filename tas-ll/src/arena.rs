//! A generational arena for listeners and connections.
//!
//! The fast path and the slow path refer to application objects only through the 64-bit opaque
//! value the application chose. Using a handle that encodes both the slot and its generation means
//! that a late notification for a closed connection can never be mistaken for a new connection
//! that reuses the slot.
use core::fmt;

/// A key of an [`Arena`] entry.
///
/// The index is in the low 32 bits of the opaque encoding, the generation in the high bits. The
/// generation is never zero so no handle encodes to zero.
///
/// [`Arena`]: struct.Arena.html
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

/// A growable slot map with generation checked handles.
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl Handle {
    /// The opaque value shared with the other actors.
    pub fn to_opaque(self) -> u64 {
        u64::from(self.generation) << 32 | u64::from(self.index)
    }

    /// Decode an opaque value, without checking that it refers to a live entry.
    pub fn from_opaque(opaque: u64) -> Option<Self> {
        let generation = (opaque >> 32) as u32;
        if generation == 0 {
            return None;
        }
        Some(Handle { index: opaque as u32, generation })
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle { index, generation: slot.generation };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 1, value: Some(value) });
        Handle { index, generation: 1 }
    }

    /// The handle the next `insert` returns.
    pub fn next_handle(&self) -> Handle {
        match self.free.last() {
            Some(&index) => Handle { index, generation: self.slots[index as usize].generation },
            None => Handle { index: self.slots.len() as u32, generation: 1 },
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots.get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots.get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// Remove an entry, invalidating its handle.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let value = slot.value.take()?;

        // Skip zero on wrap so that no handle encodes to zero.
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item=(Handle, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            let handle = Handle { index: index as u32, generation: slot.generation };
            slot.value.as_ref().map(|value| (handle, value))
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Arena::new()
    }
}
