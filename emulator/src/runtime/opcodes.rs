//! The opcode table
//!
//! Every one of the 512 opcodes has an entry, built once. Most entries are a [`Pipeline`] composed
//! from the stages, the rest point to a dedicated handler or are named but unimplemented.

use once_cell::sync::Lazy;
use parse_display::Display;
use tracing::trace;

use super::devices::{io, IoFunction};
use super::exception::Fault;
use super::instructions;
use super::stages::{
    Action, BooleanFunction, Condition, DoubleOperate, DoublePipeline, Fetch, Fill, FlagRule,
    HalfTransfer, MaskSkip, Modifier, Operate, Pair, Pipeline, Store, Test,
};
use super::word::{Half, Word};
use super::{Computer, Effect, Instruction};

pub(crate) type Special = fn(&mut Computer, &Instruction) -> Result<Effect, Fault>;

pub(crate) enum Handler {
    Pipeline(Pipeline),
    Double(DoublePipeline),
    Special(Special),
    /// The accumulator field selects the instruction
    ByAccumulator(Box<[Entry; 16]>),
    Unimplemented,
}

pub(crate) struct Entry {
    mnemonic: String,
    handler: Handler,
}

impl Entry {
    fn new(mnemonic: impl Into<String>, handler: Handler) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            handler,
        }
    }

    fn execute(&self, cpu: &mut Computer, inst: &Instruction) -> Result<Effect, Fault> {
        match &self.handler {
            Handler::Pipeline(pipeline) => pipeline.execute(cpu, inst),
            Handler::Double(pipeline) => pipeline.execute(cpu, inst),
            Handler::Special(handler) => handler(cpu, inst),
            Handler::ByAccumulator(entries) => entries[inst.ac() as usize].execute(cpu, inst),
            Handler::Unimplemented => Err(Fault::UnimplementedOpcode {
                opcode: inst.opcode(),
                mnemonic: self.mnemonic.clone(),
                pc: inst.pc.address(),
            }),
        }
    }

    /// The entry actually describing an instruction word
    fn select(&self, word: Word) -> &Self {
        match &self.handler {
            Handler::ByAccumulator(entries) => &entries[word.ac() as usize],
            _ => self,
        }
    }
}

/// Where the operands of a family member come from and where its result goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
enum Mode {
    /// Memory operand, result in the accumulator
    #[display("")]
    Basic,
    /// Immediate operand, result in the accumulator
    #[display("I")]
    Immediate,
    /// Result in memory
    #[display("M")]
    Memory,
    /// Result in memory, and in the accumulator unless it is AC 0
    #[display("S")]
    ToSelf,
    /// Result in memory and in the accumulator
    #[display("B")]
    Both,
}

impl Mode {
    /// Modes of the families with a "both" variant, in opcode order
    const BOTH: [Self; 4] = [Self::Basic, Self::Immediate, Self::Memory, Self::Both];

    /// Modes of the families with a "self" variant, in opcode order
    const SELF: [Self; 4] = [Self::Basic, Self::Immediate, Self::Memory, Self::ToSelf];

    /// The operand other than the accumulator
    const fn operand(self) -> Fetch {
        match self {
            Self::Immediate => Fetch::Immediate,
            _ => Fetch::Memory,
        }
    }

    const fn store(self) -> Store {
        match self {
            Self::Basic | Self::Immediate => Store::Ac,
            Self::Memory => Store::Memory,
            Self::ToSelf => Store::SelfNonZero,
            Self::Both => Store::Both,
        }
    }
}

pub(crate) struct OpcodeTable {
    entries: Vec<Entry>,
}

pub(crate) static OPCODES: Lazy<OpcodeTable> = Lazy::new(OpcodeTable::build);

/// Mnemonic of an instruction word, as used in traces
#[must_use]
pub fn mnemonic(word: Word) -> &'static str {
    OPCODES.lookup(word).mnemonic.as_str()
}

impl OpcodeTable {
    fn build() -> Self {
        let entries = (0..0o1000)
            .map(|opcode| Entry::new(format!("{opcode:03o}"), Handler::Unimplemented))
            .collect();
        let mut table = Self { entries };

        table.stubs();
        table.double_words();
        table.moves();
        table.shifts();
        table.control();
        table.arithmetic();
        table.comparisons();
        table.booleans();
        table.half_words();
        table.tests();
        table.io();
        table
    }

    fn set(&mut self, opcode: u16, mnemonic: impl Into<String>, handler: Handler) {
        self.entries[usize::from(opcode)] = Entry::new(mnemonic, handler);
    }

    fn pipeline(&mut self, opcode: u16, mnemonic: impl Into<String>, pipeline: Pipeline) {
        self.set(opcode, mnemonic, Handler::Pipeline(pipeline));
    }

    fn special(&mut self, opcode: u16, mnemonic: &str, handler: Special) {
        self.set(opcode, mnemonic, Handler::Special(handler));
    }

    fn stub(&mut self, opcode: u16, mnemonic: impl Into<String>) {
        self.set(opcode, mnemonic, Handler::Unimplemented);
    }

    fn lookup(&self, word: Word) -> &Entry {
        self.entries[usize::from(word.opcode())].select(word)
    }

    pub fn dispatch(&self, cpu: &mut Computer, inst: &Instruction) -> Result<Effect, Fault> {
        let entry = &self.entries[usize::from(inst.opcode())];
        trace!(
            mnemonic = entry.select(inst.word).mnemonic.as_str(),
            ea = inst.ea.address,
            "Executing {}",
            inst.word
        );
        entry.execute(cpu, inst)
    }

    /// Instructions which exist but have no emulated semantics
    fn stubs(&mut self) {
        for opcode in 0o000..0o100 {
            self.stub(opcode, format!("UUO{opcode:02o}"));
        }

        for (opcode, mnemonic) in [
            (0o100, "UJEN"),
            (0o102, "GFAD"),
            (0o103, "GFSB"),
            (0o104, "JSYS"),
            (0o106, "GFMP"),
            (0o107, "GFDV"),
            (0o110, "DFAD"),
            (0o111, "DFSB"),
            (0o112, "DFMP"),
            (0o113, "DFDV"),
            (0o116, "DMUL"),
            (0o117, "DDIV"),
            (0o122, "FIX"),
            (0o123, "EXTEND"),
            (0o126, "FIXR"),
            (0o127, "FLTR"),
            (0o130, "UFA"),
            (0o131, "DFN"),
            (0o132, "FSC"),
            (0o133, "IBP"),
            (0o134, "ILDB"),
            (0o135, "LDB"),
            (0o136, "IDPB"),
            (0o137, "DPB"),
            (0o257, "MAP"),
        ] {
            self.stub(opcode, mnemonic);
        }

        // Floating point, with a rounding variant for each
        for (base, name) in [(0o140, "FAD"), (0o150, "FSB"), (0o160, "FMP"), (0o170, "FDV")] {
            for (offset, suffix) in ["", "L", "M", "B", "R", "RI", "RM", "RB"].iter().enumerate() {
                self.stub(base + offset as u16, format!("{name}{suffix}"));
            }
        }

        for (base, name) in [(0o220, "IMUL"), (0o224, "MUL"), (0o230, "IDIV"), (0o234, "DIV")] {
            for (offset, mode) in Mode::BOTH.iter().enumerate() {
                self.stub(base + offset as u16, format!("{name}{mode}"));
            }
        }
    }

    fn double_words(&mut self) {
        let double = |src, src2, operate, store| {
            Handler::Double(DoublePipeline {
                src,
                src2,
                operate,
                store,
            })
        };

        self.set(
            0o114,
            "DADD",
            double(Pair::Ac, Some(Pair::Memory), Some(DoubleOperate::Add), Pair::Ac),
        );
        self.set(
            0o115,
            "DSUB",
            double(Pair::Ac, Some(Pair::Memory), Some(DoubleOperate::Subtract), Pair::Ac),
        );
        self.set(0o120, "DMOVE", double(Pair::Memory, None, None, Pair::Ac));
        self.set(
            0o121,
            "DMOVN",
            double(Pair::Memory, None, Some(DoubleOperate::Negate), Pair::Ac),
        );
        self.set(0o124, "DMOVEM", double(Pair::Ac, None, None, Pair::Memory));
        self.set(
            0o125,
            "DMOVNM",
            double(Pair::Ac, None, Some(DoubleOperate::Negate), Pair::Memory),
        );
    }

    /// `MOVE`, `MOVS`, `MOVN` and `MOVM`
    fn moves(&mut self) {
        let kinds = [
            ("MOVE", None, None),
            ("MOVS", Some(Operate::Swap), None),
            ("MOVN", Some(Operate::Negate), Some(FlagRule::Negate)),
            ("MOVM", Some(Operate::Magnitude), Some(FlagRule::Magnitude)),
        ];

        for (kind, (name, operate, flags)) in kinds.into_iter().enumerate() {
            for (offset, mode) in Mode::SELF.into_iter().enumerate() {
                let src = match mode {
                    Mode::Memory => Fetch::Ac,
                    _ => mode.operand(),
                };
                let pipeline = Pipeline {
                    src: Some(src),
                    flags,
                    operate,
                    store: Some(mode.store()),
                    ..Pipeline::default()
                };
                let opcode = 0o200 + 4 * kind as u16 + offset as u16;
                self.pipeline(opcode, format!("{name}{mode}"), pipeline);
            }
        }
    }

    fn shifts(&mut self) {
        self.special(0o240, "ASH", instructions::ash);
        self.special(0o241, "ROT", instructions::rot);
        self.special(0o242, "LSH", instructions::lsh);
        self.special(0o243, "JFFO", instructions::jffo);
        self.special(0o244, "ASHC", instructions::ashc);
        self.special(0o245, "ROTC", instructions::rotc);
        self.special(0o246, "LSHC", instructions::lshc);
    }

    fn control(&mut self) {
        self.special(0o105, "ADJSP", instructions::adjsp);
        self.special(0o250, "EXCH", instructions::exch);
        self.special(0o251, "BLT", instructions::blt);
        self.special(0o252, "AOBJP", instructions::aobjp);
        self.special(0o253, "AOBJN", instructions::aobjn);
        self.set(0o254, "JRST", Handler::ByAccumulator(Box::new(jrst_functions())));
        self.special(0o255, "JFCL", instructions::jfcl);
        self.special(0o256, "XCT", instructions::xct);

        self.special(0o260, "PUSHJ", instructions::pushj);
        self.special(0o261, "PUSH", instructions::push);
        self.special(0o262, "POP", instructions::pop);
        self.special(0o263, "POPJ", instructions::popj);
        self.special(0o264, "JSR", instructions::jsr);
        self.special(0o265, "JSP", instructions::jsp);
        self.special(0o266, "JSA", instructions::jsa);
        self.special(0o267, "JRA", instructions::jra);
    }

    /// `ADD` and `SUB`
    fn arithmetic(&mut self) {
        for (base, name, operate, flags) in [
            (0o270, "ADD", Operate::Add, FlagRule::Add),
            (0o274, "SUB", Operate::Subtract, FlagRule::Subtract),
        ] {
            for (offset, mode) in Mode::BOTH.into_iter().enumerate() {
                let pipeline = Pipeline::fetch(Fetch::Ac)
                    .with_src2(mode.operand())
                    .with_flags(flags)
                    .with_operate(operate)
                    .with_store(mode.store());
                self.pipeline(base + offset as u16, format!("{name}{mode}"), pipeline);
            }
        }
    }

    /// `CAI`, `CAM`, `JUMP`, `SKIP`, `AOJ`, `AOS`, `SOJ` and `SOS`
    fn comparisons(&mut self) {
        for (offset, condition) in Condition::ALL.into_iter().enumerate() {
            let opcode = |base: u16| base + offset as u16;

            self.pipeline(
                opcode(0o300),
                format!("CAI{condition}"),
                Pipeline::fetch(Fetch::Ac)
                    .with_src2(Fetch::Immediate)
                    .with_branch(Test::Compare(condition), Action::Skip),
            );
            self.pipeline(
                opcode(0o310),
                format!("CAM{condition}"),
                Pipeline::fetch(Fetch::Ac)
                    .with_src2(Fetch::Memory)
                    .with_branch(Test::Compare(condition), Action::Skip),
            );
            self.pipeline(
                opcode(0o320),
                format!("JUMP{condition}"),
                Pipeline::fetch(Fetch::Ac).with_branch(Test::Value(condition), Action::Jump),
            );
            self.pipeline(
                opcode(0o330),
                format!("SKIP{condition}"),
                Pipeline::fetch(Fetch::Memory)
                    .with_store(Store::AcIfNonZero)
                    .with_branch(Test::Value(condition), Action::Skip),
            );

            for (base, name, operate, flags) in [
                (0o340, "AOJ", Operate::Add, FlagRule::Add),
                (0o360, "SOJ", Operate::Subtract, FlagRule::Subtract),
            ] {
                self.pipeline(
                    opcode(base),
                    format!("{name}{condition}"),
                    Pipeline::fetch(Fetch::Ac)
                        .with_src2(Fetch::One)
                        .with_flags(flags)
                        .with_operate(operate)
                        .with_store(Store::Ac)
                        .with_branch(Test::Value(condition), Action::Jump),
                );
            }

            for (base, name, operate, flags) in [
                (0o350, "AOS", Operate::Add, FlagRule::Add),
                (0o370, "SOS", Operate::Subtract, FlagRule::Subtract),
            ] {
                self.pipeline(
                    opcode(base),
                    format!("{name}{condition}"),
                    Pipeline::fetch(Fetch::Memory)
                        .with_src2(Fetch::One)
                        .with_flags(flags)
                        .with_operate(operate)
                        .with_store(Store::SelfNonZero)
                        .with_branch(Test::Value(condition), Action::Skip),
                );
            }
        }
    }

    /// The 16 boolean functions, from `SETZ` to `SETO`
    fn booleans(&mut self) {
        for (index, function) in BooleanFunction::ALL.into_iter().enumerate() {
            for (offset, mode) in Mode::BOTH.into_iter().enumerate() {
                let pipeline = Pipeline {
                    src: function.uses_ac().then_some(Fetch::Ac),
                    src2: function.uses_memory().then_some(mode.operand()),
                    operate: Some(Operate::Boolean(function)),
                    store: Some(mode.store()),
                    ..Pipeline::default()
                };
                let opcode = 0o400 + 4 * index as u16 + offset as u16;
                self.pipeline(opcode, format!("{function}{mode}"), pipeline);
            }
        }

        // SETMI, with the section of E outside section 0
        self.pipeline(
            0o415,
            "XMOVEI",
            Pipeline::fetch(Fetch::Address).with_store(Store::Ac),
        );
    }

    /// `HLL` to `HLRE`
    ///
    /// Opcode bits select the destination half, the fill, whether the halves cross, then the mode.
    fn half_words(&mut self) {
        let fills = [Fill::None, Fill::Zeros, Fill::Ones, Fill::Extend];

        for (to_index, to) in [Half::Left, Half::Right].into_iter().enumerate() {
            for (fill_index, fill) in fills.into_iter().enumerate() {
                for (cross, from) in [to, to.other()].into_iter().enumerate() {
                    let transfer = HalfTransfer { from, to, fill };
                    for (offset, mode) in Mode::SELF.into_iter().enumerate() {
                        let opcode = 0o500
                            + 0o40 * to_index as u16
                            + 0o10 * fill_index as u16
                            + 4 * cross as u16
                            + offset as u16;
                        self.pipeline(
                            opcode,
                            format!("{transfer}{mode}"),
                            half_word(transfer, mode),
                        );
                    }
                }
            }
        }

        let extended = Pipeline {
            src: Some(Fetch::Address),
            ..half_word(
                HalfTransfer {
                    from: Half::Left,
                    to: Half::Left,
                    fill: Fill::None,
                },
                Mode::Immediate,
            )
        };
        self.pipeline(0o501, "XHLLI", extended);
    }

    /// `TRN` to `TSOA`
    ///
    /// Opcode bits select the modifier, whether the mask is in memory, the skip, then whether the
    /// mask is swapped.
    fn tests(&mut self) {
        let modifiers = [
            Modifier::None,
            Modifier::Zeros,
            Modifier::Complement,
            Modifier::Ones,
        ];
        let skips = [MaskSkip::Never, MaskSkip::E, MaskSkip::A, MaskSkip::N];
        let masks = [
            ("R", Fetch::Immediate),
            ("L", Fetch::ImmediateSwapped),
            ("D", Fetch::Memory),
            ("S", Fetch::MemorySwapped),
        ];

        for (modifier_index, modifier) in modifiers.into_iter().enumerate() {
            for (skip_index, skip) in skips.into_iter().enumerate() {
                for (mask_index, (name, mask)) in masks.into_iter().enumerate() {
                    let mut pipeline = Pipeline::fetch(Fetch::Ac).with_src2(mask);
                    if modifier != Modifier::None {
                        pipeline = pipeline
                            .with_operate(Operate::Mask(modifier))
                            .with_store(Store::Ac);
                    }
                    if skip != MaskSkip::Never {
                        pipeline = pipeline.with_branch(Test::Masked(skip), Action::Skip);
                    }

                    let opcode = 0o600
                        + 0o20 * modifier_index as u16
                        + 0o10 * (mask_index as u16 >> 1)
                        + 2 * skip_index as u16
                        + (mask_index as u16 & 1);
                    self.pipeline(opcode, format!("T{name}{modifier}{skip}"), pipeline);
                }
            }
        }
    }

    /// Instructions `700` to `777`, named after their function
    fn io(&mut self) {
        for opcode in 0o700..0o1000 {
            let functions: [Entry; 16] = std::array::from_fn(|ac| {
                Entry::new(
                    IoFunction::from_bits(ac as u64).to_string(),
                    Handler::Special(io),
                )
            });
            self.set(opcode, "I/O", Handler::ByAccumulator(Box::new(functions)));
        }
    }
}

fn half_word(transfer: HalfTransfer, mode: Mode) -> Pipeline {
    let (src, dst) = match mode {
        Mode::Basic => (Fetch::Memory, Fetch::Ac),
        Mode::Immediate => (Fetch::Immediate, Fetch::Ac),
        Mode::Memory => (Fetch::Ac, Fetch::Memory),
        Mode::ToSelf | Mode::Both => (Fetch::Memory, Fetch::Memory),
    };

    Pipeline {
        src: Some(src),
        // The destination only matters if its other half is kept
        src2: (transfer.fill == Fill::None).then_some(dst),
        operate: Some(Operate::Half(transfer)),
        store: Some(mode.store()),
        ..Pipeline::default()
    }
}

/// `JRST` functions, selected by the accumulator field
fn jrst_functions() -> [Entry; 16] {
    std::array::from_fn(|function| match function {
        0o0 => Entry::new("JRST", Handler::Special(instructions::jrst)),
        0o4 => Entry::new("HALT", Handler::Special(instructions::halt)),
        0o1 => Entry::new("PORTAL", Handler::Unimplemented),
        0o2 => Entry::new("JRSTF", Handler::Unimplemented),
        0o5 => Entry::new("XJRSTF", Handler::Unimplemented),
        0o6 => Entry::new("XJEN", Handler::Unimplemented),
        0o7 => Entry::new("XPCW", Handler::Unimplemented),
        0o10 => Entry::new("RSTOR", Handler::Unimplemented),
        0o12 => Entry::new("JEN", Handler::Unimplemented),
        0o14 => Entry::new("SFM", Handler::Unimplemented),
        _ => Entry::new(format!("JRST {function:o},"), Handler::Unimplemented),
    })
}
