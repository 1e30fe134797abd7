//! Recovers descriptor bindings from SPIR-V so that descriptor set layouts and descriptor writes
//! can be driven by binding names instead of hand-written layout declarations.

use crate::{FluentDescriptorType, FluentResult, FluentShaderStageFlags};
use fnv::FnvHashMap;
use rspirv::dr::{Instruction, Module, Operand};
use rspirv::spirv::{Decoration, Dim, Op, StorageClass, Word};
#[cfg(feature = "serde-support")]
use serde::{Deserialize, Serialize};

/// One descriptor binding used by a shader
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(Serialize, Deserialize))]
pub struct FluentBinding {
    pub set: u32,
    pub binding: u32,
    /// 1 unless the binding is an array
    pub descriptor_count: u32,
    pub descriptor_type: FluentDescriptorType,
    /// Every stage that uses the binding
    pub stage: FluentShaderStageFlags,
    pub name: String,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
struct FluentBindingKey {
    set: u32,
    binding: u32,
}

impl FluentBinding {
    fn binding_key(&self) -> FluentBindingKey {
        FluentBindingKey {
            set: self.set,
            binding: self.binding,
        }
    }

    fn verify_compatible_across_stages(
        &self,
        other: &Self,
    ) -> FluentResult<()> {
        if self.descriptor_type != other.descriptor_type {
            return Err(crate::FluentError::ReflectionError(format!(
                "stages use different descriptor types {:?} and {:?} at (set={} binding={})",
                self.descriptor_type, other.descriptor_type, self.set, self.binding
            )));
        }

        if self.descriptor_count != other.descriptor_count {
            return Err(crate::FluentError::ReflectionError(format!(
                "stages use different descriptor counts {} and {} at (set={} binding={})",
                self.descriptor_count, other.descriptor_count, self.set, self.binding
            )));
        }

        Ok(())
    }
}

/// The bindings of one shader stage, or the merged bindings of several
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FluentReflectionData {
    /// Sorted by set, then binding. At most one entry per (set, binding).
    pub bindings: Vec<FluentBinding>,
    binding_map: FnvHashMap<String, usize>,
}

impl FluentReflectionData {
    pub fn new(mut bindings: Vec<FluentBinding>) -> Self {
        bindings.sort_by_key(|x| x.binding_key());

        let mut binding_map = FnvHashMap::default();
        for (index, binding) in bindings.iter().enumerate() {
            if binding.name.is_empty() {
                continue;
            }

            if let Some(&existing) = binding_map.get(&binding.name) {
                let existing: &FluentBinding = &bindings[existing];
                log::warn!(
                    "Binding name {} is used at (set={} binding={}) and (set={} binding={}), writes by name will use the first",
                    binding.name,
                    existing.set,
                    existing.binding,
                    binding.set,
                    binding.binding
                );
                continue;
            }

            binding_map.insert(binding.name.clone(), index);
        }

        FluentReflectionData {
            bindings,
            binding_map,
        }
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn binding_by_name(
        &self,
        name: &str,
    ) -> Option<&FluentBinding> {
        self.binding_map.get(name).map(|&index| &self.bindings[index])
    }

    pub fn binding_by_slot(
        &self,
        set: u32,
        binding: u32,
    ) -> Option<&FluentBinding> {
        self.bindings
            .iter()
            .find(|x| x.set == set && x.binding == binding)
    }

    pub fn bindings_in_set(
        &self,
        set: u32,
    ) -> impl Iterator<Item = &FluentBinding> {
        self.bindings.iter().filter(move |x| x.set == set)
    }

    /// Highest set index used plus one
    pub fn set_count(&self) -> u32 {
        self.bindings.iter().map(|x| x.set + 1).max().unwrap_or(0)
    }

    /// All stages any binding is used in
    pub fn stages(&self) -> FluentShaderStageFlags {
        self.bindings
            .iter()
            .fold(FluentShaderStageFlags::empty(), |stages, x| stages | x.stage)
    }

    /// Combine the bindings of several stages. A (set, binding) declared by more than one stage
    /// becomes one binding whose stage mask covers all of them. Declarations that disagree on
    /// type or count are an error.
    pub fn merge(stages: &[&FluentReflectionData]) -> FluentResult<FluentReflectionData> {
        log::trace!("Merge reflection data of {} stages", stages.len());
        let mut merged_bindings = FnvHashMap::<FluentBindingKey, FluentBinding>::default();

        for stage in stages {
            for binding in &stage.bindings {
                let key = binding.binding_key();
                if let Some(existing_binding) = merged_bindings.get_mut(&key) {
                    existing_binding.verify_compatible_across_stages(binding)?;

                    log::trace!(
                        "    Binding {} already used in stages {:?}, adding stage {:?}",
                        binding.name,
                        existing_binding.stage,
                        binding.stage
                    );
                    existing_binding.stage |= binding.stage;
                    if existing_binding.name.is_empty() {
                        existing_binding.name = binding.name.clone();
                    }
                } else {
                    merged_bindings.insert(key, binding.clone());
                }
            }
        }

        Ok(FluentReflectionData::new(
            merged_bindings.into_iter().map(|(_, v)| v).collect(),
        ))
    }
}

/// Reflect the descriptor bindings of one stage's SPIR-V bytecode
pub fn reflect_spirv(
    bytecode: &[u8],
    stage: FluentShaderStageFlags,
) -> FluentResult<FluentReflectionData> {
    if bytecode.len() % 4 != 0 {
        return Err(crate::FluentError::ReflectionError(format!(
            "SPIR-V bytecode length {} is not a multiple of 4",
            bytecode.len()
        )));
    }

    let words: Vec<u32> = bytecode
        .chunks_exact(4)
        .map(|x| u32::from_le_bytes([x[0], x[1], x[2], x[3]]))
        .collect();

    reflect_spirv_words(&words, stage)
}

pub fn reflect_spirv_words(
    words: &[u32],
    stage: FluentShaderStageFlags,
) -> FluentResult<FluentReflectionData> {
    profiling::scope!("reflect_spirv_words");
    let module = rspirv::dr::load_words(words).map_err(|e| {
        crate::FluentError::ReflectionError(format!("failed to parse SPIR-V: {:?}", e))
    })?;

    let reflector = SpirvReflector::new(&module);
    let mut bindings = Vec::default();
    for variable in &module.types_global_values {
        if variable.class.opcode != Op::Variable {
            continue;
        }

        if let Some(binding) = reflector.reflect_variable(variable, stage)? {
            log::trace!(
                "Reflected {:?} binding {} at (set={} binding={})",
                binding.descriptor_type,
                binding.name,
                binding.set,
                binding.binding
            );
            bindings.push(binding);
        }
    }

    Ok(FluentReflectionData::new(bindings))
}

#[derive(Default)]
struct SpirvDecorations {
    set: Option<u32>,
    binding: Option<u32>,
    block: bool,
    buffer_block: bool,
}

// Lookup tables over the parts of a module that describe global variables
struct SpirvReflector<'a> {
    names: FnvHashMap<Word, &'a str>,
    decorations: FnvHashMap<Word, SpirvDecorations>,
    definitions: FnvHashMap<Word, &'a Instruction>,
}

impl<'a> SpirvReflector<'a> {
    fn new(module: &'a Module) -> Self {
        let mut names = FnvHashMap::default();
        for instruction in &module.debug_names {
            if instruction.class.opcode != Op::Name {
                continue;
            }

            if let (Some(Operand::IdRef(target)), Some(Operand::LiteralString(name))) =
                (instruction.operands.get(0), instruction.operands.get(1))
            {
                names.insert(*target, name.as_str());
            }
        }

        let mut decorations = FnvHashMap::<Word, SpirvDecorations>::default();
        for instruction in &module.annotations {
            if instruction.class.opcode != Op::Decorate {
                continue;
            }

            let target = match instruction.operands.get(0) {
                Some(Operand::IdRef(target)) => *target,
                _ => continue,
            };

            let entry = decorations.entry(target).or_default();
            match (instruction.operands.get(1), instruction.operands.get(2)) {
                (Some(Operand::Decoration(Decoration::DescriptorSet)), Some(Operand::LiteralBit32(x))) => {
                    entry.set = Some(*x)
                }
                (Some(Operand::Decoration(Decoration::Binding)), Some(Operand::LiteralBit32(x))) => {
                    entry.binding = Some(*x)
                }
                (Some(Operand::Decoration(Decoration::Block)), _) => entry.block = true,
                (Some(Operand::Decoration(Decoration::BufferBlock)), _) => {
                    entry.buffer_block = true
                }
                _ => {}
            }
        }

        let definitions = module
            .types_global_values
            .iter()
            .filter_map(|x| x.result_id.map(|id| (id, x)))
            .collect();

        SpirvReflector {
            names,
            decorations,
            definitions,
        }
    }

    fn definition(
        &self,
        id: Word,
    ) -> FluentResult<&'a Instruction> {
        self.definitions.get(&id).copied().ok_or_else(|| {
            crate::FluentError::ReflectionError(format!("id {} has no type or constant definition", id))
        })
    }

    fn id_operand(
        instruction: &Instruction,
        index: usize,
    ) -> FluentResult<Word> {
        match instruction.operands.get(index) {
            Some(Operand::IdRef(id)) => Ok(*id),
            other => Err(crate::FluentError::ReflectionError(format!(
                "{:?} operand {} is {:?}, expected an id",
                instruction.class.opcode, index, other
            ))),
        }
    }

    fn literal_operand(
        instruction: &Instruction,
        index: usize,
    ) -> FluentResult<u32> {
        match instruction.operands.get(index) {
            Some(Operand::LiteralBit32(x)) => Ok(*x),
            other => Err(crate::FluentError::ReflectionError(format!(
                "{:?} operand {} is {:?}, expected a 32-bit literal",
                instruction.class.opcode, index, other
            ))),
        }
    }

    fn reflect_variable(
        &self,
        variable: &Instruction,
        stage: FluentShaderStageFlags,
    ) -> FluentResult<Option<FluentBinding>> {
        let storage_class = match variable.operands.get(0) {
            Some(Operand::StorageClass(x)) => *x,
            _ => return Ok(None),
        };

        match storage_class {
            StorageClass::UniformConstant | StorageClass::Uniform | StorageClass::StorageBuffer => {}
            _ => return Ok(None),
        }

        let variable_id = match variable.result_id {
            Some(x) => x,
            None => return Ok(None),
        };

        let (set, binding) = match self.decorations.get(&variable_id) {
            Some(SpirvDecorations {
                set: Some(set),
                binding: Some(binding),
                ..
            }) => (*set, *binding),
            // Not a descriptor, for example a uniform without a binding in an OpenGL-style shader
            _ => return Ok(None),
        };

        let pointer_type_id = variable.result_type.ok_or_else(|| {
            crate::FluentError::ReflectionError(format!("variable {} has no type", variable_id))
        })?;
        let pointer_type = self.definition(pointer_type_id)?;
        if pointer_type.class.opcode != Op::TypePointer {
            return Err(crate::FluentError::ReflectionError(format!(
                "variable {} is not a pointer",
                variable_id
            )));
        }

        // Peel off arrays, multiplying out the descriptor count
        let mut type_id = Self::id_operand(pointer_type, 1)?;
        let mut descriptor_count = 1;
        loop {
            let ty = self.definition(type_id)?;
            match ty.class.opcode {
                Op::TypeArray => {
                    let length = self.definition(Self::id_operand(ty, 1)?)?;
                    if length.class.opcode != Op::Constant {
                        return Err(crate::FluentError::ReflectionError(format!(
                            "array length of binding (set={} binding={}) is not a constant",
                            set, binding
                        )));
                    }
                    descriptor_count *= Self::literal_operand(length, 0)?;
                    type_id = Self::id_operand(ty, 0)?;
                }
                Op::TypeRuntimeArray => {
                    return Err(crate::FluentError::ReflectionError(format!(
                        "binding (set={} binding={}) is an unsized array",
                        set, binding
                    )));
                }
                _ => break,
            }
        }

        let descriptor_type = self.descriptor_type(storage_class, type_id, set, binding)?;

        let name = self
            .names
            .get(&type_id)
            .filter(|x| !x.is_empty())
            .or_else(|| self.names.get(&variable_id))
            .map(|x| x.to_string())
            .unwrap_or_default();

        Ok(Some(FluentBinding {
            set,
            binding,
            descriptor_count,
            descriptor_type,
            stage,
            name,
        }))
    }

    fn descriptor_type(
        &self,
        storage_class: StorageClass,
        type_id: Word,
        set: u32,
        binding: u32,
    ) -> FluentResult<FluentDescriptorType> {
        let ty = self.definition(type_id)?;
        let block_decorations = self.decorations.get(&type_id);
        let is_block = block_decorations.map(|x| x.block).unwrap_or(false);
        let is_buffer_block = block_decorations.map(|x| x.buffer_block).unwrap_or(false);

        let descriptor_type = match (storage_class, ty.class.opcode) {
            (StorageClass::StorageBuffer, Op::TypeStruct) => FluentDescriptorType::STORAGE_BUFFER,
            (StorageClass::Uniform, Op::TypeStruct) if is_buffer_block => {
                FluentDescriptorType::STORAGE_BUFFER
            }
            (StorageClass::Uniform, Op::TypeStruct) if is_block => {
                FluentDescriptorType::UNIFORM_BUFFER
            }
            (StorageClass::UniformConstant, Op::TypeSampler) => FluentDescriptorType::SAMPLER,
            (StorageClass::UniformConstant, Op::TypeImage) => {
                let dim = match ty.operands.get(1) {
                    Some(Operand::Dim(dim)) => *dim,
                    other => {
                        return Err(crate::FluentError::ReflectionError(format!(
                            "image type {} has dimension operand {:?}",
                            type_id, other
                        )))
                    }
                };
                // 1 = used with a sampler, 2 = storage
                let sampled = Self::literal_operand(ty, 5)?;

                match dim {
                    Dim::DimBuffer if sampled == 2 => FluentDescriptorType::STORAGE_TEXEL_BUFFER,
                    Dim::DimBuffer => FluentDescriptorType::UNIFORM_TEXEL_BUFFER,
                    Dim::DimSubpassData => FluentDescriptorType::INPUT_ATTACHMENT,
                    _ if sampled == 2 => FluentDescriptorType::STORAGE_IMAGE,
                    _ => FluentDescriptorType::SAMPLED_IMAGE,
                }
            }
            (StorageClass::UniformConstant, Op::TypeSampledImage) => {
                return Err(crate::FluentError::ReflectionError(format!(
                    "binding (set={} binding={}) is a combined image sampler, use a separate texture and sampler",
                    set, binding
                )));
            }
            (storage_class, opcode) => {
                return Err(crate::FluentError::ReflectionError(format!(
                    "binding (set={} binding={}) has unsupported type {:?} in storage class {:?}",
                    set, binding, opcode, storage_class
                )));
            }
        };

        Ok(descriptor_type)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const OP_NAME: u32 = 5;
    const OP_MEMORY_MODEL: u32 = 14;
    const OP_CAPABILITY: u32 = 17;
    const OP_TYPE_INT: u32 = 21;
    const OP_TYPE_FLOAT: u32 = 22;
    const OP_TYPE_VECTOR: u32 = 23;
    const OP_TYPE_IMAGE: u32 = 25;
    const OP_TYPE_SAMPLER: u32 = 26;
    const OP_TYPE_SAMPLED_IMAGE: u32 = 27;
    const OP_TYPE_ARRAY: u32 = 28;
    const OP_TYPE_RUNTIME_ARRAY: u32 = 29;
    const OP_TYPE_STRUCT: u32 = 30;
    const OP_TYPE_POINTER: u32 = 32;
    const OP_CONSTANT: u32 = 43;
    const OP_VARIABLE: u32 = 59;
    const OP_DECORATE: u32 = 71;

    const DECORATION_BLOCK: u32 = 2;
    const DECORATION_BUFFER_BLOCK: u32 = 3;
    const DECORATION_BINDING: u32 = 33;
    const DECORATION_DESCRIPTOR_SET: u32 = 34;

    pub(crate) const STORAGE_CLASS_UNIFORM_CONSTANT: u32 = 0;
    pub(crate) const STORAGE_CLASS_UNIFORM: u32 = 2;
    pub(crate) const STORAGE_CLASS_STORAGE_BUFFER: u32 = 12;

    pub(crate) const DIM_2D: u32 = 1;
    pub(crate) const DIM_BUFFER: u32 = 5;
    pub(crate) const DIM_SUBPASS_DATA: u32 = 6;

    // Minimal SPIR-V assembler, enough to describe descriptor declarations.
    //
    // Instructions must appear in logical layout order: capabilities and memory model, names,
    // decorations, then types and variables. Each section is collected separately and joined at
    // the end.
    #[derive(Default)]
    pub(crate) struct SpirvModuleBuilder {
        names: Vec<u32>,
        annotations: Vec<u32>,
        types: Vec<u32>,
        next_id: u32,
        float_type: Option<u32>,
        int_type: Option<u32>,
    }

    fn instruction(
        out: &mut Vec<u32>,
        opcode: u32,
        operands: &[u32],
    ) {
        out.push(((operands.len() as u32 + 1) << 16) | opcode);
        out.extend_from_slice(operands);
    }

    fn string_words(s: &str) -> Vec<u32> {
        let mut bytes = s.as_bytes().to_vec();
        // nul terminated, padded to a whole word
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
            .chunks_exact(4)
            .map(|x| u32::from_le_bytes([x[0], x[1], x[2], x[3]]))
            .collect()
    }

    impl SpirvModuleBuilder {
        pub(crate) fn new() -> Self {
            SpirvModuleBuilder {
                next_id: 1,
                ..Default::default()
            }
        }

        fn id(&mut self) -> u32 {
            let id = self.next_id;
            self.next_id += 1;
            id
        }

        pub(crate) fn name(
            &mut self,
            target: u32,
            name: &str,
        ) {
            let mut operands = vec![target];
            operands.extend(string_words(name));
            instruction(&mut self.names, OP_NAME, &operands);
        }

        fn decorate(
            &mut self,
            target: u32,
            operands: &[u32],
        ) {
            let mut all = vec![target];
            all.extend_from_slice(operands);
            instruction(&mut self.annotations, OP_DECORATE, &all);
        }

        fn float_type(&mut self) -> u32 {
            if let Some(x) = self.float_type {
                return x;
            }
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_FLOAT, &[id, 32]);
            self.float_type = Some(id);
            id
        }

        fn int_type(&mut self) -> u32 {
            if let Some(x) = self.int_type {
                return x;
            }
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_INT, &[id, 32, 0]);
            self.int_type = Some(id);
            id
        }

        /// A struct holding one vec4, decorated as Block or BufferBlock
        pub(crate) fn block_struct(
            &mut self,
            type_name: &str,
            buffer_block: bool,
        ) -> u32 {
            let float = self.float_type();
            let vec4 = self.id();
            instruction(&mut self.types, OP_TYPE_VECTOR, &[vec4, float, 4]);
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_STRUCT, &[id, vec4]);
            self.name(id, type_name);
            let decoration = if buffer_block {
                DECORATION_BUFFER_BLOCK
            } else {
                DECORATION_BLOCK
            };
            self.decorate(id, &[decoration]);
            id
        }

        pub(crate) fn image_type(
            &mut self,
            dim: u32,
            sampled: u32,
        ) -> u32 {
            let float = self.float_type();
            let id = self.id();
            // sampled type, dim, depth, arrayed, ms, sampled, format (Unknown)
            instruction(
                &mut self.types,
                OP_TYPE_IMAGE,
                &[id, float, dim, 0, 0, 0, sampled, 0],
            );
            id
        }

        pub(crate) fn sampler_type(&mut self) -> u32 {
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_SAMPLER, &[id]);
            id
        }

        pub(crate) fn sampled_image_type(&mut self) -> u32 {
            let image = self.image_type(DIM_2D, 1);
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_SAMPLED_IMAGE, &[id, image]);
            id
        }

        pub(crate) fn array_type(
            &mut self,
            element: u32,
            length: u32,
        ) -> u32 {
            let int = self.int_type();
            let constant = self.id();
            instruction(&mut self.types, OP_CONSTANT, &[int, constant, length]);
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_ARRAY, &[id, element, constant]);
            id
        }

        pub(crate) fn runtime_array_type(
            &mut self,
            element: u32,
        ) -> u32 {
            let id = self.id();
            instruction(&mut self.types, OP_TYPE_RUNTIME_ARRAY, &[id, element]);
            id
        }

        pub(crate) fn variable(
            &mut self,
            ty: u32,
            storage_class: u32,
            name: &str,
            set: Option<u32>,
            binding: Option<u32>,
        ) -> u32 {
            let pointer = self.id();
            instruction(&mut self.types, OP_TYPE_POINTER, &[pointer, storage_class, ty]);
            let id = self.id();
            instruction(&mut self.types, OP_VARIABLE, &[pointer, id, storage_class]);
            self.name(id, name);
            if let Some(set) = set {
                self.decorate(id, &[DECORATION_DESCRIPTOR_SET, set]);
            }
            if let Some(binding) = binding {
                self.decorate(id, &[DECORATION_BINDING, binding]);
            }
            id
        }

        pub(crate) fn uniform_buffer(
            &mut self,
            type_name: &str,
            variable_name: &str,
            set: u32,
            binding: u32,
        ) -> u32 {
            let block = self.block_struct(type_name, false);
            self.variable(
                block,
                STORAGE_CLASS_UNIFORM,
                variable_name,
                Some(set),
                Some(binding),
            )
        }

        pub(crate) fn words(&self) -> Vec<u32> {
            // magic, version 1.0, generator, bound, schema
            let mut words = vec![0x0723_0203, 0x0001_0000, 0, self.next_id, 0];
            // Capability Shader, MemoryModel Logical GLSL450
            instruction(&mut words, OP_CAPABILITY, &[1]);
            instruction(&mut words, OP_MEMORY_MODEL, &[0, 1]);
            words.extend_from_slice(&self.names);
            words.extend_from_slice(&self.annotations);
            words.extend_from_slice(&self.types);
            words
        }

        pub(crate) fn bytes(&self) -> Vec<u8> {
            self.words()
                .iter()
                .flat_map(|x| x.to_le_bytes().to_vec())
                .collect()
        }
    }

    #[test]
    fn test_uniform_buffer() {
        let mut builder = SpirvModuleBuilder::new();
        builder.uniform_buffer("PerViewData", "per_view_data", 0, 0);

        let reflection =
            reflect_spirv(&builder.bytes(), FluentShaderStageFlags::VERTEX).unwrap();
        assert_eq!(1, reflection.binding_count());
        let binding = reflection.binding_by_name("PerViewData").unwrap();
        assert_eq!(FluentDescriptorType::UNIFORM_BUFFER, binding.descriptor_type);
        assert_eq!(0, binding.set);
        assert_eq!(0, binding.binding);
        assert_eq!(1, binding.descriptor_count);
        assert_eq!(FluentShaderStageFlags::VERTEX, binding.stage);
    }

    #[test]
    fn test_storage_buffers() {
        let mut builder = SpirvModuleBuilder::new();
        let legacy = builder.block_struct("LegacyStorage", true);
        builder.variable(legacy, STORAGE_CLASS_UNIFORM, "legacy", Some(0), Some(0));
        let modern = builder.block_struct("ModernStorage", false);
        builder.variable(
            modern,
            STORAGE_CLASS_STORAGE_BUFFER,
            "modern",
            Some(0),
            Some(1),
        );

        let reflection =
            reflect_spirv_words(&builder.words(), FluentShaderStageFlags::COMPUTE).unwrap();
        assert_eq!(2, reflection.binding_count());
        for binding in &reflection.bindings {
            assert_eq!(FluentDescriptorType::STORAGE_BUFFER, binding.descriptor_type);
        }
    }

    #[test]
    fn test_images_and_samplers() {
        let mut builder = SpirvModuleBuilder::new();
        let sampled = builder.image_type(DIM_2D, 1);
        builder.variable(sampled, STORAGE_CLASS_UNIFORM_CONSTANT, "albedo", Some(1), Some(0));
        let sampler = builder.sampler_type();
        builder.variable(sampler, STORAGE_CLASS_UNIFORM_CONSTANT, "smp", Some(1), Some(1));
        let storage = builder.image_type(DIM_2D, 2);
        builder.variable(storage, STORAGE_CLASS_UNIFORM_CONSTANT, "output", Some(1), Some(2));
        let uniform_texel = builder.image_type(DIM_BUFFER, 1);
        builder.variable(
            uniform_texel,
            STORAGE_CLASS_UNIFORM_CONSTANT,
            "lut",
            Some(1),
            Some(3),
        );
        let storage_texel = builder.image_type(DIM_BUFFER, 2);
        builder.variable(
            storage_texel,
            STORAGE_CLASS_UNIFORM_CONSTANT,
            "histogram",
            Some(1),
            Some(4),
        );
        let subpass = builder.image_type(DIM_SUBPASS_DATA, 2);
        builder.variable(
            subpass,
            STORAGE_CLASS_UNIFORM_CONSTANT,
            "gbuffer",
            Some(1),
            Some(5),
        );

        let reflection =
            reflect_spirv_words(&builder.words(), FluentShaderStageFlags::FRAGMENT).unwrap();

        let expected = [
            ("albedo", FluentDescriptorType::SAMPLED_IMAGE),
            ("smp", FluentDescriptorType::SAMPLER),
            ("output", FluentDescriptorType::STORAGE_IMAGE),
            ("lut", FluentDescriptorType::UNIFORM_TEXEL_BUFFER),
            ("histogram", FluentDescriptorType::STORAGE_TEXEL_BUFFER),
            ("gbuffer", FluentDescriptorType::INPUT_ATTACHMENT),
        ];

        assert_eq!(expected.len(), reflection.binding_count());
        for (name, descriptor_type) in expected.iter() {
            assert_eq!(
                *descriptor_type,
                reflection.binding_by_name(name).unwrap().descriptor_type,
                "{}",
                name
            );
        }

        // Sorted by slot
        let slots: Vec<_> = reflection.bindings.iter().map(|x| x.binding).collect();
        assert_eq!(vec![0, 1, 2, 3, 4, 5], slots);
    }

    #[test]
    fn test_array_count() {
        let mut builder = SpirvModuleBuilder::new();
        let image = builder.image_type(DIM_2D, 1);
        let array = builder.array_type(image, 8);
        builder.variable(array, STORAGE_CLASS_UNIFORM_CONSTANT, "textures", Some(0), Some(3));

        let reflection =
            reflect_spirv_words(&builder.words(), FluentShaderStageFlags::FRAGMENT).unwrap();
        let binding = reflection.binding_by_name("textures").unwrap();
        assert_eq!(8, binding.descriptor_count);
        assert_eq!(FluentDescriptorType::SAMPLED_IMAGE, binding.descriptor_type);
    }

    #[test]
    fn test_runtime_array_rejected() {
        let mut builder = SpirvModuleBuilder::new();
        let image = builder.image_type(DIM_2D, 1);
        let array = builder.runtime_array_type(image);
        builder.variable(array, STORAGE_CLASS_UNIFORM_CONSTANT, "textures", Some(0), Some(0));

        assert!(reflect_spirv_words(&builder.words(), FluentShaderStageFlags::FRAGMENT).is_err());
    }

    #[test]
    fn test_combined_image_sampler_rejected() {
        let mut builder = SpirvModuleBuilder::new();
        let combined = builder.sampled_image_type();
        builder.variable(combined, STORAGE_CLASS_UNIFORM_CONSTANT, "tex", Some(0), Some(0));

        match reflect_spirv_words(&builder.words(), FluentShaderStageFlags::FRAGMENT) {
            Err(crate::FluentError::ReflectionError(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_undecorated_variables_ignored() {
        let mut builder = SpirvModuleBuilder::new();
        let block = builder.block_struct("NoBinding", false);
        builder.variable(block, STORAGE_CLASS_UNIFORM, "no_binding", None, None);

        let reflection =
            reflect_spirv_words(&builder.words(), FluentShaderStageFlags::VERTEX).unwrap();
        assert_eq!(0, reflection.binding_count());
    }

    #[test]
    fn test_invalid_bytecode() {
        assert!(reflect_spirv(&[1, 2, 3], FluentShaderStageFlags::VERTEX).is_err());
        assert!(reflect_spirv(&[0; 8], FluentShaderStageFlags::VERTEX).is_err());
    }

    #[test]
    fn test_merge_dedups_shared_binding() {
        let mut vertex = SpirvModuleBuilder::new();
        vertex.uniform_buffer("PerFrame", "per_frame", 0, 0);
        let mut fragment = SpirvModuleBuilder::new();
        fragment.uniform_buffer("PerFrame", "per_frame", 0, 0);
        let fragment_image = fragment.image_type(DIM_2D, 1);
        fragment.variable(
            fragment_image,
            STORAGE_CLASS_UNIFORM_CONSTANT,
            "albedo",
            Some(0),
            Some(1),
        );

        let vertex =
            reflect_spirv_words(&vertex.words(), FluentShaderStageFlags::VERTEX).unwrap();
        let fragment =
            reflect_spirv_words(&fragment.words(), FluentShaderStageFlags::FRAGMENT).unwrap();

        let merged = FluentReflectionData::merge(&[&vertex, &fragment]).unwrap();
        assert_eq!(2, merged.binding_count());

        let slot_0: Vec<_> = merged
            .bindings
            .iter()
            .filter(|x| x.set == 0 && x.binding == 0)
            .collect();
        assert_eq!(1, slot_0.len());
        assert_eq!(
            FluentShaderStageFlags::VERTEX | FluentShaderStageFlags::FRAGMENT,
            slot_0[0].stage
        );

        assert_eq!(
            FluentShaderStageFlags::FRAGMENT,
            merged.binding_by_name("albedo").unwrap().stage
        );
        assert_eq!(
            FluentShaderStageFlags::VERTEX | FluentShaderStageFlags::FRAGMENT,
            merged.stages()
        );
    }

    #[test]
    fn test_merge_conflict() {
        let mut vertex = SpirvModuleBuilder::new();
        vertex.uniform_buffer("PerFrame", "per_frame", 0, 0);
        let mut fragment = SpirvModuleBuilder::new();
        let image = fragment.image_type(DIM_2D, 1);
        fragment.variable(image, STORAGE_CLASS_UNIFORM_CONSTANT, "albedo", Some(0), Some(0));

        let vertex =
            reflect_spirv_words(&vertex.words(), FluentShaderStageFlags::VERTEX).unwrap();
        let fragment =
            reflect_spirv_words(&fragment.words(), FluentShaderStageFlags::FRAGMENT).unwrap();

        assert!(FluentReflectionData::merge(&[&vertex, &fragment]).is_err());
    }

    #[test]
    fn test_set_queries() {
        let mut builder = SpirvModuleBuilder::new();
        builder.uniform_buffer("A", "a", 0, 0);
        builder.uniform_buffer("B", "b", 2, 1);

        let reflection =
            reflect_spirv_words(&builder.words(), FluentShaderStageFlags::VERTEX).unwrap();
        assert_eq!(3, reflection.set_count());
        assert_eq!(0, reflection.bindings_in_set(1).count());
        assert_eq!(1, reflection.bindings_in_set(2).count());
        assert_eq!("B", reflection.binding_by_slot(2, 1).unwrap().name);
    }
}
