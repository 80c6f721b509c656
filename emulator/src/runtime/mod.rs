use thiserror::Error;
use tracing::{debug, info, warn};

use self::address::canonical;
use crate::config::Config;
use crate::constants::Address;

mod access;
mod address;
mod devices;
mod exception;
mod instructions;
mod memory;
mod opcodes;
mod registers;
mod stages;
mod word;

pub use self::address::{AddressingMode, EffectiveAddress};
pub use self::devices::{Device, Devices, IoFunction, PriorityInterrupt, Unsupported};
pub use self::exception::Fault;
pub use self::memory::{Memory, MemoryError};
pub use self::opcodes::mnemonic;
pub use self::registers::{Accumulators, Flags, ProgramCounter, Registers};
pub use self::word::{DoubleWord, Half, Word};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("fault at {pc}: {fault}")]
    Fault { pc: ProgramCounter, fault: Fault },

    #[error("computer halted")]
    Halted,
}

type Result<T> = std::result::Result<T, ProcessorError>;

/// What an instruction does to the program counter once it completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Go to the next instruction
    Continue,
    /// Skip the next instruction
    Skip,
    /// Continue at the given address
    Jump(Address),
    /// Stop the machine, leaving the program counter at the given address
    Halt(Address),
}

/// A decoded instruction, with its effective address already resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Where the instruction was fetched from
    pub pc: ProgramCounter,
    /// The raw instruction word
    pub word: Word,
    pub ea: EffectiveAddress,
    /// Number of `XCT` instructions this one is nested in
    pub(crate) depth: usize,
}

impl Instruction {
    #[must_use]
    pub const fn opcode(&self) -> u16 {
        self.word.opcode()
    }

    /// Accumulator field, also the address of that accumulator
    #[must_use]
    pub const fn ac(&self) -> Address {
        self.word.ac() as Address
    }
}

/// Passed to the trace hook before each instruction executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub pc: ProgramCounter,
    pub ea: Address,
    pub word: Word,
}

type TraceHook = Box<dyn FnMut(&TraceEvent)>;

pub struct Computer {
    pub registers: Registers,
    pub memory: Memory,
    pub devices: Devices,
    pub config: Config,
    /// Number of instructions executed
    pub cycles: usize,
    halted: bool,
    fault: Option<Fault>,
    pending_interrupt: Option<u8>,
    trace: Option<TraceHook>,
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ registers: {:?}, memory: [...], halted: {} }}",
            self.registers, self.halted
        )
    }
}

impl Default for Computer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Computer {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::new(config.memory_words),
            devices: Devices::default(),
            config,
            cycles: 0,
            halted: false,
            fault: None,
            pending_interrupt: None,
            trace: None,
        }
    }

    #[must_use]
    pub const fn halted(&self) -> bool {
        self.halted
    }

    /// The fatal fault which halted the machine, if any
    #[must_use]
    pub const fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    /// Interrupt level the priority interrupt system was requesting at the last instruction
    /// boundary
    #[must_use]
    pub const fn pending_interrupt(&self) -> Option<u8> {
        self.pending_interrupt
    }

    /// Install a hook called with every instruction about to be executed
    pub fn set_trace_hook(&mut self, hook: impl FnMut(&TraceEvent) + 'static) {
        self.trace = Some(Box::new(hook));
    }

    /// Fetch, decode and execute a single instruction
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Halted`] if the machine is already halted, or the fault which
    /// stopped it.
    #[tracing::instrument(skip(self), fields(pc = %self.registers.pc), level = "debug")]
    pub fn step(&mut self) -> Result<()> {
        if self.halted {
            return Err(ProcessorError::Halted);
        }

        let pc = self.registers.pc;
        self.pending_interrupt = self.devices.pi.pending_level();

        match self.fetch_and_execute(pc) {
            Ok(effect) => self.apply(pc, effect),
            Err(fault) => self.recover_from_fault(pc, fault)?,
        }

        self.cycles += 1;
        debug!("Register state {}", self.registers);
        Ok(())
    }

    /// Run until the machine halts
    ///
    /// # Errors
    ///
    /// Returns the fault which stopped the machine, if it did not stop on a `HALT`.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.step() {
                Ok(()) => {}
                Err(ProcessorError::Halted) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Run at most `count` instructions, returning how many were executed
    ///
    /// # Errors
    ///
    /// Returns the fault which stopped the machine.
    #[tracing::instrument(skip(self))]
    pub fn run_steps(&mut self, count: usize) -> Result<usize> {
        for executed in 0..count {
            match self.step() {
                Ok(()) => {}
                Err(ProcessorError::Halted) => return Ok(executed),
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    fn fetch_and_execute(&mut self, pc: ProgramCounter) -> std::result::Result<Effect, Fault> {
        let word = self.read(canonical(pc.address(), AddressingMode::Local))?;
        let ea = self.resolve(word)?;

        if let Some(hook) = self.trace.as_mut() {
            hook(&TraceEvent {
                pc,
                ea: ea.address,
                word,
            });
        }

        let instruction = Instruction {
            pc,
            word,
            ea,
            depth: 0,
        };
        self.execute(&instruction)
    }

    /// Dispatch an already decoded instruction
    pub(crate) fn execute(&mut self, instruction: &Instruction) -> std::result::Result<Effect, Fault> {
        opcodes::OPCODES.dispatch(self, instruction)
    }

    fn apply(&mut self, pc: ProgramCounter, effect: Effect) {
        self.registers.pc = match effect {
            Effect::Continue => pc.next(),
            Effect::Skip => pc.skip(),
            Effect::Jump(address) => {
                debug!("Jumping to address {:o}", address);
                ProgramCounter::new(address)
            }
            Effect::Halt(address) => {
                info!("Halted at {}", pc);
                self.halted = true;
                ProgramCounter::new(address)
            }
        };
    }

    /// Decide whether a fault stops the machine
    ///
    /// Non-fatal faults raise the arithmetic trap flags and let the program continue with the next
    /// instruction.
    pub(crate) fn recover_from_fault(&mut self, pc: ProgramCounter, fault: Fault) -> Result<()> {
        if fault.is_fatal() {
            warn!(fault = %fault, "Halting on fault at {}", pc);
            self.halted = true;
            self.fault = Some(fault.clone());
            return Err(ProcessorError::Fault { pc, fault });
        }

        debug!(fault = %fault, "Recovering from fault");
        self.registers.flags |= Flags::NO_DIVIDE | Flags::TRAP1 | Flags::OVERFLOW;
        self.registers.pc = pc.next();
        Ok(())
    }
}
