//! Text format printer.
//!
//! Prints IR in an LLVM-like assembly format:
//!
//! ```text
//! %node = type { i64, ptr addrspace(1) }
//!
//! @head = addrspace(1) global ptr addrspace(1) null
//!
//! define ptr @get(ptr addrspace(1) %p) {
//! entry:
//!   %0 = addrspacecast ptr addrspace(1) %p to ptr
//!   ret ptr %0
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write};

use crate::constants::{ConstKind, ConstOp};
use crate::context::IrContext;
use crate::global::{
    Attribute, CallingConv, ComdatSelection, GlobalData, Linkage, ThreadLocalMode,
    UnnamedAddr, Visibility,
};
use crate::inst::Opcode;
use crate::metadata::MdOperand;
use crate::module::Module;
use crate::refs::*;
use crate::types::{ScalarKind, TypeData, TypeInterner};

/// Identified structs referenced while printing types, in first-use order.
struct TypeNames<'a> {
    types: &'a TypeInterner,
    structs: Vec<TypeRef>,
    seen: HashSet<TypeRef>,
}

impl<'a> TypeNames<'a> {
    fn new(types: &'a TypeInterner) -> Self {
        Self {
            types,
            structs: Vec::new(),
            seen: HashSet::new(),
        }
    }
}

/// Print state: local value numbering, plus the identified structs and
/// metadata nodes referenced so far.
struct PrintState<'a> {
    ctx: &'a IrContext,
    types: TypeNames<'a>,
    value_names: HashMap<ValueRef, String>,
    block_labels: HashMap<BlockRef, String>,
    next_slot: usize,
    md_slots: HashMap<MdRef, usize>,
    md_order: Vec<MdRef>,
}

impl<'a> PrintState<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            types: TypeNames::new(&ctx.types),
            value_names: HashMap::new(),
            block_labels: HashMap::new(),
            next_slot: 0,
            md_slots: HashMap::new(),
            md_order: Vec::new(),
        }
    }

    fn reset_numbering(&mut self) {
        self.next_slot = 0;
        self.value_names.clear();
        self.block_labels.clear();
    }

    fn assign_value_name(&mut self, v: ValueRef) {
        let name = match self.ctx.value_name(v) {
            Some(name) => format!("%{name}"),
            None => {
                let slot = self.next_slot;
                self.next_slot += 1;
                format!("%{slot}")
            }
        };
        self.value_names.insert(v, name);
    }

    fn assign_block_label(&mut self, b: BlockRef) {
        let label = match self.ctx.block(b).name {
            Some(name) => name.to_string(),
            None => {
                let slot = self.next_slot;
                self.next_slot += 1;
                slot.to_string()
            }
        };
        self.block_labels.insert(b, label);
    }

    fn block_label(&self, b: BlockRef) -> &str {
        self.block_labels.get(&b).map(|s| s.as_str()).unwrap_or("?")
    }

    fn md_slot(&mut self, md: MdRef) -> usize {
        if let Some(&slot) = self.md_slots.get(&md) {
            return slot;
        }
        let slot = self.md_order.len();
        self.md_slots.insert(md, slot);
        self.md_order.push(md);
        slot
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Print a type as IR text. Identified structs print by name.
pub fn print_type(types: &TypeInterner, ty: TypeRef) -> String {
    let mut names = TypeNames::new(types);
    let mut out = String::new();
    write_type(&mut names, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

/// Print a constant with its type, e.g. `ptr addrspace(1) @g`.
pub fn print_const(ctx: &IrContext, c: ConstRef) -> String {
    let mut state = PrintState::new(ctx);
    let mut out = String::new();
    write_typed_const(&mut state, &mut out, c).expect("fmt::Write to String never fails");
    out
}

/// Print a whole module as IR text.
pub fn print_module(ctx: &IrContext, module: &Module) -> String {
    let mut state = PrintState::new(ctx);
    let mut body = String::new();
    write_module_body(&mut state, &mut body, module).expect("fmt::Write to String never fails");

    let mut out = String::new();
    write_struct_definitions(&mut state, &mut out).expect("fmt::Write to String never fails");
    out.push_str(&body);
    write_metadata_nodes(&mut state, &mut out).expect("fmt::Write to String never fails");
    out
}

// ============================================================================
// Types
// ============================================================================

fn write_type(names: &mut TypeNames<'_>, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    let types = names.types;
    match types.get(ty) {
        TypeData::Scalar(kind) => match kind {
            ScalarKind::Void => f.write_str("void"),
            ScalarKind::Label => f.write_str("label"),
            ScalarKind::Metadata => f.write_str("metadata"),
            ScalarKind::Token => f.write_str("token"),
            ScalarKind::Int(bits) => write!(f, "i{bits}"),
            ScalarKind::Half => f.write_str("half"),
            ScalarKind::Float => f.write_str("float"),
            ScalarKind::Double => f.write_str("double"),
        },
        TypeData::Pointer { addrspace: 0 } => f.write_str("ptr"),
        TypeData::Pointer { addrspace } => write!(f, "ptr addrspace({addrspace})"),
        TypeData::Function {
            ret,
            params,
            vararg,
        } => {
            write_type(names, f, *ret)?;
            f.write_str(" (")?;
            for (i, &param) in params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_type(names, f, param)?;
            }
            if *vararg {
                f.write_str(if params.is_empty() { "..." } else { ", ..." })?;
            }
            f.write_char(')')
        }
        TypeData::Struct(st) if !st.literal => {
            if names.seen.insert(ty) {
                names.structs.push(ty);
            }
            match st.name {
                Some(name) => write!(f, "%{name}"),
                None => write!(f, "%{ty}"),
            }
        }
        TypeData::Struct(st) => write_struct_body(names, f, st.fields(), st.packed),
        TypeData::Array { elem, len } => {
            write!(f, "[{len} x ")?;
            write_type(names, f, *elem)?;
            f.write_char(']')
        }
        TypeData::Vector {
            elem,
            len,
            scalable,
        } => {
            f.write_char('<')?;
            if *scalable {
                f.write_str("vscale x ")?;
            }
            write!(f, "{len} x ")?;
            write_type(names, f, *elem)?;
            f.write_char('>')
        }
    }
}

fn write_struct_body(
    names: &mut TypeNames<'_>,
    f: &mut impl Write,
    fields: &[TypeRef],
    packed: bool,
) -> fmt::Result {
    if packed {
        f.write_char('<')?;
    }
    if fields.is_empty() {
        f.write_str("{}")?;
    } else {
        f.write_str("{ ")?;
        for (i, &field) in fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write_type(names, f, field)?;
        }
        f.write_str(" }")?;
    }
    if packed {
        f.write_char('>')?;
    }
    Ok(())
}

/// Definitions of every identified struct referenced while printing,
/// including structs only reachable through other structs' fields.
fn write_struct_definitions(state: &mut PrintState<'_>, f: &mut impl Write) -> fmt::Result {
    let names = &mut state.types;
    let types = names.types;
    let mut defs = String::new();
    let mut i = 0;
    while i < names.structs.len() {
        let ty = names.structs[i];
        i += 1;
        write_type(names, &mut defs, ty)?;
        defs.push_str(" = type ");
        let Some(st) = types.as_struct(ty) else {
            continue;
        };
        if st.is_opaque() {
            defs.push_str("opaque");
        } else {
            write_struct_body(names, &mut defs, st.fields(), st.packed)?;
        }
        defs.push('\n');
    }
    if !defs.is_empty() {
        f.write_str(&defs)?;
        f.write_char('\n')?;
    }
    Ok(())
}

// ============================================================================
// Constants
// ============================================================================

fn write_typed_const(state: &mut PrintState<'_>, f: &mut impl Write, c: ConstRef) -> fmt::Result {
    let ty = state.ctx.constants.ty(c);
    write_type(&mut state.types, f, ty)?;
    f.write_char(' ')?;
    write_const(state, f, c)
}

fn write_const(state: &mut PrintState<'_>, f: &mut impl Write, c: ConstRef) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.constants.get(c);
    match &data.kind {
        ConstKind::Int(bits) => match ctx.types.get(data.ty) {
            TypeData::Scalar(ScalarKind::Int(1)) => {
                f.write_str(if *bits & 1 == 1 { "true" } else { "false" })
            }
            TypeData::Scalar(ScalarKind::Int(width)) if *width < 64 => {
                let shift = 64 - width;
                write!(f, "{}", ((*bits << shift) as i64) >> shift)
            }
            _ => write!(f, "{}", *bits as i64),
        },
        ConstKind::Float(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
        ConstKind::Null => f.write_str("null"),
        ConstKind::Undef => f.write_str("undef"),
        ConstKind::Poison => f.write_str("poison"),
        ConstKind::Zero => f.write_str("zeroinitializer"),
        ConstKind::Global(g) => write!(f, "@{}", ctx.global(*g).name),
        ConstKind::Aggregate(elems) => {
            let (open, close) = match ctx.types.get(data.ty) {
                TypeData::Array { .. } => ("[", "]"),
                TypeData::Vector { .. } => ("<", ">"),
                TypeData::Struct(st) if st.packed => ("<{ ", " }>"),
                _ => ("{ ", " }"),
            };
            f.write_str(open)?;
            for (i, &elem) in elems.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_typed_const(state, f, elem)?;
            }
            f.write_str(close)
        }
        ConstKind::Expr(expr) => match expr.op {
            ConstOp::Cast(op) => {
                write!(f, "{} (", op.mnemonic())?;
                write_typed_const(state, f, expr.operands[0])?;
                f.write_str(" to ")?;
                write_type(&mut state.types, f, data.ty)?;
                f.write_char(')')
            }
            ConstOp::Binary(op) => {
                write!(f, "{} (", op.mnemonic())?;
                write_typed_const(state, f, expr.operands[0])?;
                f.write_str(", ")?;
                write_typed_const(state, f, expr.operands[1])?;
                f.write_char(')')
            }
            ConstOp::GetElementPtr { inbounds } => {
                f.write_str("getelementptr ")?;
                if inbounds {
                    f.write_str("inbounds ")?;
                }
                f.write_char('(')?;
                if let Some(source) = expr.source_ty {
                    write_type(&mut state.types, f, source)?;
                }
                for &op in &expr.operands {
                    f.write_str(", ")?;
                    write_typed_const(state, f, op)?;
                }
                f.write_char(')')
            }
        },
    }
}

// ============================================================================
// Module
// ============================================================================

fn write_module_body(state: &mut PrintState<'_>, f: &mut impl Write, module: &Module) -> fmt::Result {
    let ctx = state.ctx;
    let mut first = true;

    if module.comdats().next().is_some() {
        section_break(f, &mut first)?;
        for (name, selection) in module.comdats() {
            writeln!(f, "${name} = comdat {}", comdat_selection_str(selection))?;
        }
    }

    if !module.globals().is_empty() || !module.aliases().is_empty() {
        section_break(f, &mut first)?;
    }
    for &g in module.globals() {
        write_global_var(state, f, g)?;
    }
    for &a in module.aliases() {
        let data = ctx.global(a);
        let alias = ctx.alias(a);
        write!(f, "@{} = {}", data.name, linkage_prefix(data.linkage, false))?;
        write_global_attrs_prefix(f, data)?;
        if data.addrspace != 0 {
            write!(f, "addrspace({}) ", data.addrspace)?;
        }
        f.write_str("alias ")?;
        write_type(&mut state.types, f, alias.value_ty)?;
        if let Some(aliasee) = alias.aliasee {
            f.write_str(", ")?;
            write_typed_const(state, f, aliasee)?;
        }
        f.write_char('\n')?;
    }

    for &func in module.functions() {
        section_break(f, &mut first)?;
        write_function(state, f, func)?;
    }

    if !module.named_metadata.is_empty() {
        section_break(f, &mut first)?;
    }
    for nmd in &module.named_metadata {
        write!(f, "!{} = !{{", nmd.name)?;
        for (i, &md) in nmd.operands.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "!{}", state.md_slot(md))?;
        }
        f.write_str("}\n")?;
    }
    Ok(())
}

/// Blank line between top-level sections.
fn section_break(f: &mut impl Write, first: &mut bool) -> fmt::Result {
    if !std::mem::replace(first, false) {
        f.write_char('\n')?;
    }
    Ok(())
}

fn write_global_var(state: &mut PrintState<'_>, f: &mut impl Write, g: GlobalRef) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.global(g);
    let var = ctx.global_var(g);
    write!(
        f,
        "@{} = {}",
        data.name,
        linkage_prefix(data.linkage, var.initializer.is_none())
    )?;
    write_global_attrs_prefix(f, data)?;
    match var.thread_local {
        ThreadLocalMode::NotThreadLocal => {}
        ThreadLocalMode::GeneralDynamic => f.write_str("thread_local ")?,
        ThreadLocalMode::LocalDynamic => f.write_str("thread_local(localdynamic) ")?,
        ThreadLocalMode::InitialExec => f.write_str("thread_local(initialexec) ")?,
        ThreadLocalMode::LocalExec => f.write_str("thread_local(localexec) ")?,
    }
    if data.addrspace != 0 {
        write!(f, "addrspace({}) ", data.addrspace)?;
    }
    if var.externally_initialized {
        f.write_str("externally_initialized ")?;
    }
    f.write_str(if var.is_constant { "constant " } else { "global " })?;
    write_type(&mut state.types, f, var.value_ty)?;
    if let Some(init) = var.initializer {
        f.write_char(' ')?;
        write_const(state, f, init)?;
    }
    if let Some(section) = data.attrs.section {
        write!(f, ", section \"{section}\"")?;
    }
    if let Some(comdat) = data.comdat {
        write!(f, ", comdat(${comdat})")?;
    }
    if let Some(align) = data.attrs.alignment {
        write!(f, ", align {align}")?;
    }
    for &(kind, md) in &var.metadata {
        write!(f, ", !{kind} !{}", state.md_slot(md))?;
    }
    f.write_char('\n')
}

fn write_global_attrs_prefix(f: &mut impl Write, data: &GlobalData) -> fmt::Result {
    match data.attrs.visibility {
        Visibility::Default => {}
        Visibility::Hidden => f.write_str("hidden ")?,
        Visibility::Protected => f.write_str("protected ")?,
    }
    match data.attrs.unnamed_addr {
        UnnamedAddr::None => {}
        UnnamedAddr::Local => f.write_str("local_unnamed_addr ")?,
        UnnamedAddr::Global => f.write_str("unnamed_addr ")?,
    }
    Ok(())
}

fn linkage_prefix(linkage: Linkage, declaration: bool) -> &'static str {
    match linkage {
        Linkage::External if declaration => "external ",
        Linkage::External => "",
        Linkage::AvailableExternally => "available_externally ",
        Linkage::LinkOnce => "linkonce ",
        Linkage::LinkOnceOdr => "linkonce_odr ",
        Linkage::Weak => "weak ",
        Linkage::WeakOdr => "weak_odr ",
        Linkage::Appending => "appending ",
        Linkage::Internal => "internal ",
        Linkage::Private => "private ",
        Linkage::ExternWeak => "extern_weak ",
        Linkage::Common => "common ",
    }
}

fn comdat_selection_str(selection: ComdatSelection) -> &'static str {
    match selection {
        ComdatSelection::Any => "any",
        ComdatSelection::ExactMatch => "exactmatch",
        ComdatSelection::Largest => "largest",
        ComdatSelection::NoDeduplicate => "nodeduplicate",
        ComdatSelection::SameSize => "samesize",
    }
}

fn write_attr(state: &mut PrintState<'_>, f: &mut impl Write, attr: Attribute) -> fmt::Result {
    let name = match attr {
        Attribute::ByVal(_) => "byval",
        Attribute::StructRet(_) => "sret",
        Attribute::ByRef(_) => "byref",
        Attribute::NoAlias => "noalias",
        Attribute::NoCapture => "nocapture",
        Attribute::NonNull => "nonnull",
        Attribute::ReadOnly => "readonly",
        Attribute::NoUnwind => "nounwind",
        Attribute::ZExt => "zeroext",
        Attribute::SExt => "signext",
        Attribute::Align(n) => return write!(f, "align {n}"),
        Attribute::Dereferenceable(n) => return write!(f, "dereferenceable({n})"),
    };
    f.write_str(name)?;
    if let Some(ty) = attr.type_arg() {
        f.write_char('(')?;
        write_type(&mut state.types, f, ty)?;
        f.write_char(')')?;
    }
    Ok(())
}

// ============================================================================
// Functions
// ============================================================================

fn write_function(state: &mut PrintState<'_>, f: &mut impl Write, func: GlobalRef) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.global(func);
    let fdata = ctx.function(func);
    let Some((ret, params, vararg)) = ctx.types.as_function(fdata.ty) else {
        return Err(fmt::Error);
    };
    let declaration = fdata.is_declaration();
    state.reset_numbering();

    f.write_str(if declaration { "declare " } else { "define " })?;
    f.write_str(linkage_prefix(data.linkage, false))?;
    write_global_attrs_prefix(f, data)?;
    match fdata.cc {
        CallingConv::C => {}
        CallingConv::Fast => f.write_str("fastcc ")?,
        CallingConv::Cold => f.write_str("coldcc ")?,
        CallingConv::Other(n) => write!(f, "cc {n} ")?,
    }
    for &attr in &fdata.attrs.ret {
        write_attr(state, f, attr)?;
        f.write_char(' ')?;
    }
    write_type(&mut state.types, f, ret)?;
    write!(f, " @{}(", data.name)?;
    for (i, (&param, &arg)) in params.iter().zip(&fdata.args).enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_type(&mut state.types, f, param)?;
        for &attr in fdata.attrs.param(i) {
            f.write_char(' ')?;
            write_attr(state, f, attr)?;
        }
        if !declaration {
            state.assign_value_name(arg);
            write!(f, " {}", state.value_names[&arg])?;
        }
    }
    if vararg {
        f.write_str(if params.is_empty() { "..." } else { ", ..." })?;
    }
    f.write_char(')')?;
    if data.addrspace != 0 {
        write!(f, " addrspace({})", data.addrspace)?;
    }
    for &attr in &fdata.attrs.function {
        f.write_char(' ')?;
        write_attr(state, f, attr)?;
    }
    if let Some(section) = data.attrs.section {
        write!(f, " section \"{section}\"")?;
    }
    if let Some(comdat) = data.comdat {
        write!(f, " comdat(${comdat})")?;
    }
    if let Some(align) = data.attrs.alignment {
        write!(f, " align {align}")?;
    }
    if declaration {
        return f.write_char('\n');
    }
    f.write_str(" {\n")?;

    // Number blocks and values up front so forward references print.
    for &block in &fdata.blocks {
        state.assign_block_label(block);
        for &inst in &ctx.block(block).insts {
            if !ctx.types.is_void(ctx.inst(inst).ty) {
                state.assign_value_name(ctx.inst_result(inst));
            }
        }
    }
    for (i, &block) in fdata.blocks.iter().enumerate() {
        if i > 0 {
            f.write_char('\n')?;
        }
        writeln!(f, "{}:", state.block_label(block))?;
        for &inst in &ctx.block(block).insts {
            f.write_str("  ")?;
            write_inst(state, f, inst)?;
            f.write_char('\n')?;
        }
    }
    f.write_str("}\n")
}

fn write_operand(state: &mut PrintState<'_>, f: &mut impl Write, v: ValueRef) -> fmt::Result {
    match state.ctx.value_def(v) {
        ValueDef::Const(c) => write_const(state, f, c),
        ValueDef::Inst(_) | ValueDef::Arg(..) => match state.value_names.get(&v) {
            Some(name) => f.write_str(name),
            None => write!(f, "%<{v}>"),
        },
    }
}

fn write_typed_operand(state: &mut PrintState<'_>, f: &mut impl Write, v: ValueRef) -> fmt::Result {
    let ty = state.ctx.value_ty(v);
    write_type(&mut state.types, f, ty)?;
    f.write_char(' ')?;
    write_operand(state, f, v)
}

fn write_operand_list(
    state: &mut PrintState<'_>,
    f: &mut impl Write,
    operands: &[ValueRef],
) -> fmt::Result {
    for (i, &v) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_typed_operand(state, f, v)?;
    }
    Ok(())
}

fn write_inst(state: &mut PrintState<'_>, f: &mut impl Write, inst: InstRef) -> fmt::Result {
    let ctx = state.ctx;
    let data = ctx.inst(inst);
    let ops = ctx.inst_operands(inst);
    if !ctx.types.is_void(data.ty) {
        write!(f, "{} = ", state.value_names[&data.result])?;
    }
    match data.opcode {
        Opcode::Alloca => {
            f.write_str("alloca ")?;
            if let Some(allocated) = data.type_arg {
                write_type(&mut state.types, f, allocated)?;
            }
            if let Some(addrspace) = ctx.types.pointer_addrspace(data.ty)
                && addrspace != 0
            {
                write!(f, ", addrspace({addrspace})")?;
            }
            Ok(())
        }
        Opcode::Load => {
            f.write_str("load ")?;
            write_type(&mut state.types, f, data.ty)?;
            f.write_str(", ")?;
            write_typed_operand(state, f, ops[0])
        }
        Opcode::Store => {
            f.write_str("store ")?;
            write_operand_list(state, f, ops)
        }
        Opcode::GetElementPtr { inbounds } => {
            f.write_str("getelementptr ")?;
            if inbounds {
                f.write_str("inbounds ")?;
            }
            if let Some(source) = data.type_arg {
                write_type(&mut state.types, f, source)?;
            }
            f.write_str(", ")?;
            write_operand_list(state, f, ops)
        }
        Opcode::Cast(op) => {
            write!(f, "{} ", op.mnemonic())?;
            write_typed_operand(state, f, ops[0])?;
            f.write_str(" to ")?;
            write_type(&mut state.types, f, data.ty)
        }
        Opcode::Binary(op) => {
            write!(f, "{} ", op.mnemonic())?;
            write_typed_operand(state, f, ops[0])?;
            f.write_str(", ")?;
            write_operand(state, f, ops[1])
        }
        Opcode::ICmp(pred) => {
            write!(f, "icmp {} ", pred.mnemonic())?;
            write_typed_operand(state, f, ops[0])?;
            f.write_str(", ")?;
            write_operand(state, f, ops[1])
        }
        Opcode::Select => {
            f.write_str("select ")?;
            write_operand_list(state, f, ops)
        }
        Opcode::Phi => {
            f.write_str("phi ")?;
            write_type(&mut state.types, f, data.ty)?;
            for (i, (&v, &block)) in ops.iter().zip(&data.blocks).enumerate() {
                f.write_str(if i > 0 { ", [ " } else { " [ " })?;
                write_operand(state, f, v)?;
                write!(f, ", %{} ]", state.block_label(block))?;
            }
            Ok(())
        }
        Opcode::Call => {
            f.write_str("call ")?;
            write_type(&mut state.types, f, data.ty)?;
            f.write_char(' ')?;
            write_operand(state, f, ops[0])?;
            f.write_char('(')?;
            write_operand_list(state, f, &ops[1..])?;
            f.write_char(')')
        }
        Opcode::Ret => match ops.first() {
            Some(&v) => {
                f.write_str("ret ")?;
                write_typed_operand(state, f, v)
            }
            None => f.write_str("ret void"),
        },
        Opcode::Br => write!(f, "br label %{}", state.block_label(data.blocks[0])),
        Opcode::CondBr => {
            f.write_str("br ")?;
            write_typed_operand(state, f, ops[0])?;
            write!(
                f,
                ", label %{}, label %{}",
                state.block_label(data.blocks[0]),
                state.block_label(data.blocks[1])
            )
        }
        Opcode::Unreachable => f.write_str("unreachable"),
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Print every metadata node numbered so far, numbering nested nodes as
/// they are reached.
fn write_metadata_nodes(state: &mut PrintState<'_>, f: &mut impl Write) -> fmt::Result {
    if state.md_order.is_empty() {
        return Ok(());
    }
    f.write_char('\n')?;
    let ctx = state.ctx;
    let mut i = 0;
    while i < state.md_order.len() {
        let md = state.md_order[i];
        let node = ctx.metadata.get(md);
        write!(f, "!{i} = ")?;
        if node.distinct {
            f.write_str("distinct ")?;
        }
        f.write_str("!{")?;
        for (j, op) in node.operands.iter().enumerate() {
            if j > 0 {
                f.write_str(", ")?;
            }
            match op {
                MdOperand::Node(n) => write!(f, "!{}", state.md_slot(*n))?,
                MdOperand::Value(c) => write_typed_const(state, f, *c)?,
                MdOperand::String(s) => write!(f, "!{s:?}")?,
            }
        }
        f.write_str("}\n")?;
        i += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FunctionBuilder;
    use crate::global::GlobalData;
    use crate::symbol::Symbol;

    #[test]
    fn pointer_types() {
        let mut ctx = IrContext::new();
        let p0 = ctx.types.ptr(0);
        let p3 = ctx.types.ptr(3);
        let v = ctx.types.vector(p3, 2, true);
        assert_eq!(print_type(&ctx.types, p0), "ptr");
        assert_eq!(print_type(&ctx.types, p3), "ptr addrspace(3)");
        assert_eq!(print_type(&ctx.types, v), "<vscale x 2 x ptr addrspace(3)>");
    }

    #[test]
    fn types_print_from_a_bare_interner() {
        let mut types = TypeInterner::new();
        let p1 = types.ptr(1);
        let void = types.void();
        let node = types.create_struct(Some(Symbol::new("node")));
        let visit = types.function(void, [node], false);
        types.set_struct_body(node, [p1, visit], false);
        assert_eq!(print_type(&types, node), "%node");
        assert_eq!(print_type(&types, visit), "void (%node)");
    }

    #[test]
    fn constant_expressions() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let i32_ty = ctx.types.int(32);
        let p0 = ctx.types.ptr(0);
        let g = module.add_global(&mut ctx, GlobalData::variable(Symbol::new("g"), i32_ty, 1));
        let gc = ctx.global_const(g);
        let cast = ctx.constants.cast(crate::inst::CastOp::AddrSpaceCast, gc, p0);
        let minus_one = ctx.constants.int(i32_ty, u32::MAX as u64);
        assert_eq!(
            print_const(&ctx, cast),
            "ptr addrspacecast (ptr addrspace(1) @g to ptr)"
        );
        assert_eq!(print_const(&ctx, minus_one), "i32 -1");
    }

    #[test]
    fn module_snapshot() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let i64_ty = ctx.types.int(64);
        let node = ctx.types.create_struct(Some(Symbol::new("node")));
        let next = ctx.types.ptr(1);
        ctx.types.set_struct_body(node, [i64_ty, next], false);
        let null = ctx.constants.null(next);

        let head = module.add_global(&mut ctx, GlobalData::variable(Symbol::new("head"), next, 1));
        ctx.global_var_mut(head).initializer = Some(null);

        let p0 = ctx.types.ptr(0);
        let fn_ty = ctx.types.function(p0, [next], false);
        let get = module.add_global(&mut ctx, GlobalData::function(Symbol::new("get"), fn_ty, 0));
        let p_arg = ctx.function(get).args[0];
        ctx.set_value_name(p_arg, Some(Symbol::new("p")));
        let mut b = FunctionBuilder::new(&mut ctx, get);
        let entry = b.append_block(Some(Symbol::new("entry")));
        b.position_at_end(entry);
        let p = b.arg(0);
        let field = b.gep(node, p, [], true);
        let cast = b.addrspace_cast(field, 0);
        b.ret(Some(cast));

        insta::assert_snapshot!(print_module(&ctx, &module), @r"
        %node = type { i64, ptr addrspace(1) }

        @head = addrspace(1) global ptr addrspace(1) null

        define ptr @get(ptr addrspace(1) %p) {
        entry:
          %0 = getelementptr inbounds %node, ptr addrspace(1) %p
          %1 = addrspacecast ptr addrspace(1) %0 to ptr
          ret ptr %1
        }
        ");
    }
}
