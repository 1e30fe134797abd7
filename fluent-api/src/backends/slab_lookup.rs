use crate::{FluentError, FluentResult};
use fluent_base::slab::{GenSlab, SlabKey};

// A handle whose slot was freed or reused reports which kind of object it referred to

pub(crate) fn lookup<'a, T>(
    slab: &'a GenSlab<T>,
    key: SlabKey,
    kind: &'static str,
) -> FluentResult<&'a T> {
    slab.get(key).ok_or(FluentError::StaleHandle(kind))
}

pub(crate) fn lookup_mut<'a, T>(
    slab: &'a mut GenSlab<T>,
    key: SlabKey,
    kind: &'static str,
) -> FluentResult<&'a mut T> {
    slab.get_mut(key).ok_or(FluentError::StaleHandle(kind))
}

pub(crate) fn take<T>(
    slab: &mut GenSlab<T>,
    key: SlabKey,
    kind: &'static str,
) -> FluentResult<T> {
    slab.remove(key).ok_or(FluentError::StaleHandle(kind))
}
