use crate::*;

const POOL_TYPE_COUNT: usize = DESCRIPTOR_POOL_TYPES.len();

/// How many descriptors of each pool type one descriptor set consumes
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct DescriptorSetCost {
    descriptors: [u32; POOL_TYPE_COUNT],
}

impl DescriptorSetCost {
    pub(crate) fn for_bindings<'a, I: IntoIterator<Item = &'a FluentBinding>>(
        bindings: I
    ) -> FluentResult<Self> {
        let mut cost = DescriptorSetCost::default();
        for binding in bindings {
            let pool_type_index = DESCRIPTOR_POOL_TYPES
                .iter()
                .position(|x| *x == binding.descriptor_type)
                .ok_or_else(|| {
                    format!(
                        "binding {} (set={} binding={}) has type {:?}, which can't be allocated from a descriptor pool",
                        binding.name, binding.set, binding.binding, binding.descriptor_type
                    )
                })?;

            let descriptors = &mut cost.descriptors[pool_type_index];
            *descriptors = descriptors
                .checked_add(binding.descriptor_count)
                .ok_or_else(|| {
                    format!(
                        "binding {} (set={} binding={}) overflows the {:?} descriptor count",
                        binding.name, binding.set, binding.binding, binding.descriptor_type
                    )
                })?;
        }

        Ok(cost)
    }
}

/// Accounting for a device-wide descriptor pool with a fixed number of sets and a fixed number of
/// descriptors per type. Allocation fails once either runs out, and freeing returns capacity.
pub(crate) struct DescriptorPool {
    max_sets: u32,
    descriptors_per_type: u32,
    allocated_sets: u32,
    allocated_descriptors: [u32; POOL_TYPE_COUNT],
}

impl DescriptorPool {
    pub(crate) fn new(device_info: &FluentDeviceInfo) -> Self {
        DescriptorPool {
            max_sets: device_info.max_descriptor_sets,
            descriptors_per_type: device_info.descriptors_per_type,
            allocated_sets: 0,
            allocated_descriptors: [0; POOL_TYPE_COUNT],
        }
    }

    pub(crate) fn allocate(
        &mut self,
        cost: &DescriptorSetCost,
    ) -> FluentResult<()> {
        if self.allocated_sets >= self.max_sets {
            Err(format!(
                "descriptor pool is out of sets ({} allocated)",
                self.allocated_sets
            ))?;
        }

        for (index, required) in cost.descriptors.iter().enumerate() {
            let total = self.allocated_descriptors[index].checked_add(*required);
            if total.map(|x| x > self.descriptors_per_type).unwrap_or(true) {
                Err(format!(
                    "descriptor pool is out of {:?} descriptors ({} of {} allocated, {} requested)",
                    DESCRIPTOR_POOL_TYPES[index],
                    self.allocated_descriptors[index],
                    self.descriptors_per_type,
                    required
                ))?;
            }
        }

        self.allocated_sets += 1;
        for (allocated, required) in self
            .allocated_descriptors
            .iter_mut()
            .zip(cost.descriptors.iter())
        {
            *allocated += required;
        }

        Ok(())
    }

    pub(crate) fn free(
        &mut self,
        cost: &DescriptorSetCost,
    ) {
        debug_assert!(self.allocated_sets > 0);
        self.allocated_sets -= 1;
        for (allocated, required) in self
            .allocated_descriptors
            .iter_mut()
            .zip(cost.descriptors.iter())
        {
            *allocated -= required;
        }
    }

    pub(crate) fn allocated_set_count(&self) -> u32 {
        self.allocated_sets
    }
}
