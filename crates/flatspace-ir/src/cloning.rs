//! Function body cloning through a `ValueMapper`.

use smallvec::SmallVec;

use crate::context::{InstBuilder, IrContext};
use crate::mapper::ValueMapper;
use crate::refs::{GlobalRef, InstRef};

/// Clone the body of `old_f` into the empty function `new_f`.
///
/// Arguments without an entry in the mapper's value map are mapped
/// positionally. Every block and instruction result of `old_f` is entered
/// in the value map. Instructions are created first with their original
/// operands and remapped afterwards, so operands referring to values
/// defined later in the body (phi back-edges) resolve correctly.
pub fn clone_function_body(
    ctx: &mut IrContext,
    new_f: GlobalRef,
    old_f: GlobalRef,
    mapper: &mut ValueMapper<'_>,
) {
    debug_assert!(
        ctx.function(new_f).is_declaration(),
        "clone_function_body: {new_f} already has a body"
    );
    let old_args = ctx.function(old_f).args.clone();
    let new_args = ctx.function(new_f).args.clone();
    for (&old, &new) in old_args.iter().zip(&new_args) {
        mapper.vmap().values.entry(old).or_insert(new);
    }

    let old_blocks = ctx.function(old_f).blocks.clone();
    let mut cloned: Vec<InstRef> = Vec::new();
    for &old_block in &old_blocks {
        let name = ctx.block(old_block).name;
        let new_block = ctx.append_block(new_f, name);
        mapper.vmap().blocks.insert(old_block, new_block);

        let insts: SmallVec<[InstRef; 8]> = ctx.block(old_block).insts.clone();
        for old_inst in insts {
            let data = ctx.inst(old_inst);
            let (opcode, ty, type_arg) = (data.opcode, data.ty, data.type_arg);
            let blocks = data.blocks.clone();
            let old_result = data.result;
            let operands: SmallVec<[_; 8]> = ctx.inst_operands(old_inst).into();

            let ty = mapper.remap_type(&mut ctx.types, ty);
            let mut builder = InstBuilder::new(opcode, ty).operands(operands);
            if let Some(type_arg) = type_arg {
                builder = builder.type_arg(mapper.remap_type(&mut ctx.types, type_arg));
            }
            for b in blocks {
                builder = builder.block(b);
            }
            if let Some(name) = ctx.value_name(old_result) {
                builder = builder.name(name);
            }
            let new_inst = ctx.create_inst(builder);
            ctx.push_inst(new_block, new_inst);
            let new_result = ctx.inst_result(new_inst);
            mapper.vmap().values.insert(old_result, new_result);
            cloned.push(new_inst);
        }
    }

    for inst in cloned {
        mapper.remap_instruction(ctx, inst);
    }
}
