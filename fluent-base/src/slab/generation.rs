use super::GenerationCounterT;

/// Identifies one particular value stored in a `Generation`. Each time the slot is emptied the
/// index advances, so indexes handed out for earlier values stop matching.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct GenerationIndex(GenerationCounterT);

impl GenerationIndex {
    pub fn new(counter: GenerationCounterT) -> Self {
        GenerationIndex(counter)
    }

    pub fn counter(self) -> GenerationCounterT {
        self.0
    }
}

/// A slot holding an optional T, readable only with the generation index that was returned when the
/// value was stored.
///
/// Misuse (storing into an occupied slot, emptying with a stale index) panics, since it always
/// points at a bookkeeping bug in the owner.
pub struct Generation<T> {
    generation_index: GenerationIndex,
    value: Option<T>,
}

impl<T> Default for Generation<T> {
    fn default() -> Self {
        Generation {
            generation_index: GenerationIndex::default(),
            value: None,
        }
    }
}

impl<T> Generation<T> {
    pub fn new() -> Self {
        Default::default()
    }

    /// True if a value is stored and it is the one `generation` refers to
    pub fn exists(
        &self,
        generation: GenerationIndex,
    ) -> bool {
        self.value.is_some() && self.generation_index == generation
    }

    pub fn get(
        &self,
        generation: GenerationIndex,
    ) -> Option<&T> {
        if self.generation_index == generation {
            self.value.as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(
        &mut self,
        generation: GenerationIndex,
    ) -> Option<&mut T> {
        if self.generation_index == generation {
            self.value.as_mut()
        } else {
            None
        }
    }

    /// Store a value in an empty slot and return the index that refers to it
    pub fn store(
        &mut self,
        value: T,
    ) -> GenerationIndex {
        assert!(
            self.value.is_none(),
            "Can only store into a generation that is empty"
        );
        self.value = Some(value);
        self.generation_index
    }

    /// Empty the slot and return what it held. The generation advances so `generation` goes stale.
    pub fn take(
        &mut self,
        generation: GenerationIndex,
    ) -> T {
        assert!(
            self.generation_index == generation,
            "Can not take from a generation with incorrect generation_index"
        );
        let value = self
            .value
            .take()
            .expect("Can only take from a generation that holds a value");
        self.generation_index.0 = self.generation_index.0.wrapping_add(1);
        value
    }

    pub fn is_none(&self) -> bool {
        self.value.is_none()
    }

    /// The index of the stored value, or of the next value if the slot is empty
    pub fn generation_index(&self) -> GenerationIndex {
        self.generation_index
    }

    pub fn get_unchecked(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Empty the slot regardless of generation. Used when the whole owner is torn down.
    pub fn take_unchecked(&mut self) -> Option<T> {
        let value = self.value.take();
        if value.is_some() {
            self.generation_index.0 = self.generation_index.0.wrapping_add(1);
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_get() {
        let mut slot = Generation::new();
        assert!(slot.get(GenerationIndex(0)).is_none());

        let first = slot.store(10);
        assert_eq!(Some(&10), slot.get(first));

        assert_eq!(10, slot.take(first));
        assert!(slot.get(first).is_none());
        assert!(!slot.exists(first));

        // A new value gets a new index, and the old index keeps failing
        let second = slot.store(20);
        assert_ne!(first, second);
        assert!(slot.get(first).is_none());
        assert_eq!(Some(&20), slot.get(second));
    }

    #[test]
    fn test_generation_get_mut() {
        let mut slot = Generation::new();
        let index = slot.store(1);
        *slot.get_mut(index).unwrap() += 1;
        assert_eq!(Some(&2), slot.get(index));
    }

    #[test]
    #[should_panic(expected = "Can only store into a generation that is empty")]
    fn test_double_store() {
        let mut slot = Generation::new();
        slot.store(0);
        slot.store(0);
    }

    #[test]
    #[should_panic(expected = "Can not take from a generation with incorrect generation_index")]
    fn test_take_stale_index() {
        let mut slot = Generation::new();
        let index = slot.store(0);
        slot.take(index);
        slot.store(0);
        slot.take(index);
    }

    #[test]
    fn test_take_unchecked_advances() {
        let mut slot = Generation::new();
        let index = slot.store(5);
        assert_eq!(Some(5), slot.take_unchecked());
        assert_eq!(None, slot.take_unchecked());
        assert_ne!(index, slot.generation_index());
    }
}
