use super::Generation;
use super::GenerationIndex;
use super::SlabIndexT;

/// A key into a `GenSlab`: slot index plus the generation of the value it was created for.
///
/// Keys are untyped so that a public, backend-neutral handle can wrap one while the backend stores
/// its own native type in the slab.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct SlabKey {
    index: SlabIndexT,
    generation_index: GenerationIndex,
}

impl SlabKey {
    pub fn new(
        index: SlabIndexT,
        generation_index: GenerationIndex,
    ) -> Self {
        SlabKey {
            index,
            generation_index,
        }
    }

    pub fn index(&self) -> SlabIndexT {
        self.index
    }

    pub fn generation_index(&self) -> GenerationIndex {
        self.generation_index
    }
}

impl std::fmt::Debug for SlabKey {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        write!(
            f,
            "SlabKey({}v{})",
            self.index,
            self.generation_index.counter()
        )
    }
}

/// Storage where every slot carries a generation. Values are inserted and removed explicitly by the
/// owner; keys held elsewhere stop resolving once their value is removed.
pub struct GenSlab<T> {
    storage: Vec<Generation<T>>,
    free_list: Vec<SlabIndexT>,
}

impl<T> Default for GenSlab<T> {
    fn default() -> Self {
        GenSlab::new()
    }
}

impl<T> GenSlab<T> {
    pub fn new() -> Self {
        GenSlab {
            storage: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: SlabIndexT) -> Self {
        let mut storage = Vec::with_capacity(capacity as usize);
        let mut free_list = Vec::with_capacity(capacity as usize);

        // reverse count so index 0 is at the top of the free list
        for index in (0..capacity).rev() {
            storage.push(Generation::new());
            free_list.push(index);
        }

        GenSlab { storage, free_list }
    }

    /// Store a value and return the key that refers to it
    pub fn insert(
        &mut self,
        value: T,
    ) -> SlabKey {
        if let Some(index) = self.free_list.pop() {
            let generation_index = self.storage[index as usize].store(value);
            SlabKey::new(index, generation_index)
        } else {
            let mut generation = Generation::new();
            let generation_index = generation.store(value);
            let index = self.storage.len() as SlabIndexT;
            self.storage.push(generation);
            SlabKey::new(index, generation_index)
        }
    }

    /// Remove and return the value for `key`, or None if the key is stale
    pub fn remove(
        &mut self,
        key: SlabKey,
    ) -> Option<T> {
        let slot = self.storage.get_mut(key.index as usize)?;
        if !slot.exists(key.generation_index) {
            return None;
        }

        let value = slot.take(key.generation_index);
        self.free_list.push(key.index);
        Some(value)
    }

    pub fn exists(
        &self,
        key: SlabKey,
    ) -> bool {
        self.storage
            .get(key.index as usize)
            .map(|x| x.exists(key.generation_index))
            .unwrap_or(false)
    }

    pub fn get(
        &self,
        key: SlabKey,
    ) -> Option<&T> {
        self.storage.get(key.index as usize)?.get(key.generation_index)
    }

    pub fn get_mut(
        &mut self,
        key: SlabKey,
    ) -> Option<&mut T> {
        self.storage
            .get_mut(key.index as usize)?
            .get_mut(key.generation_index)
    }

    /// Iterate all live values along with their keys
    pub fn iter(&self) -> impl Iterator<Item = (SlabKey, &T)> {
        self.storage.iter().enumerate().filter_map(|(index, slot)| {
            slot.get_unchecked()
                .map(|value| (SlabKey::new(index as SlabIndexT, slot.generation_index()), value))
        })
    }

    /// Remove every value, invalidating all outstanding keys
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::with_capacity(self.count());
        for (index, slot) in self.storage.iter_mut().enumerate() {
            if let Some(value) = slot.take_unchecked() {
                values.push(value);
                self.free_list.push(index as SlabIndexT);
            }
        }

        values
    }

    /// Number of live values
    pub fn count(&self) -> usize {
        self.storage.len() - self.free_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_one() {
        let mut slab = GenSlab::<u32>::new();
        let key = slab.insert(123);

        assert_eq!(1, slab.count());
        assert_eq!(Some(123), slab.remove(key));
        assert_eq!(0, slab.count());
    }

    #[test]
    fn test_double_remove_is_none() {
        let mut slab = GenSlab::<u32>::new();
        let key = slab.insert(123);

        assert_eq!(Some(123), slab.remove(key));
        assert_eq!(None, slab.remove(key));
        assert_eq!(0, slab.count());
    }

    #[test]
    fn test_insert_remove_many() {
        let mut slab = GenSlab::<u32>::with_capacity(16);
        let keys: Vec<_> = (0..1000).map(|i| slab.insert(i)).collect();
        assert_eq!(1000, slab.count());

        for key in keys.iter().rev() {
            assert!(slab.remove(*key).is_some());
        }

        assert!(slab.is_empty());
    }

    #[test]
    fn test_stale_key_after_reuse() {
        let mut slab = GenSlab::<u32>::new();
        let first_key = slab.insert(1);
        slab.remove(first_key);

        let second_key = slab.insert(2);

        // Same slot, different generation
        assert_eq!(first_key.index(), second_key.index());
        assert_ne!(first_key, second_key);

        assert!(slab.get(first_key).is_none());
        assert!(slab.get_mut(first_key).is_none());
        assert!(!slab.exists(first_key));
        assert_eq!(Some(&2), slab.get(second_key));
    }

    #[test]
    fn test_get_mut() {
        let mut slab = GenSlab::<u32>::new();
        let keys: Vec<_> = (0..10).map(|i| slab.insert(i)).collect();
        *slab.get_mut(keys[5]).unwrap() = 50;
        assert_eq!(Some(&50), slab.get(keys[5]));
    }

    #[test]
    fn test_unknown_index_is_none() {
        let slab = GenSlab::<u32>::new();
        let key = SlabKey::new(42, GenerationIndex::default());
        assert!(slab.get(key).is_none());
        assert!(!slab.exists(key));
    }

    #[test]
    fn test_iter_and_drain() {
        let mut slab = GenSlab::<u32>::new();
        let a = slab.insert(1);
        let b = slab.insert(2);
        let c = slab.insert(3);
        slab.remove(b);

        let mut seen: Vec<_> = slab.iter().map(|(key, value)| (key, *value)).collect();
        seen.sort_by_key(|(_, value)| *value);
        assert_eq!(vec![(a, 1), (c, 3)], seen);

        let mut drained = slab.drain();
        drained.sort();
        assert_eq!(vec![1, 3], drained);
        assert!(slab.is_empty());
        assert!(slab.get(a).is_none());

        // Slots are reused after a drain
        let d = slab.insert(4);
        assert!(d.index() <= 2);
    }
}
