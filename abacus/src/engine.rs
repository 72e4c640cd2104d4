/// The evaluation context: every piece of process-wide state gathered into
/// one struct passed to each entry point. Hosts the global symbol table,
/// function registry, object types, static slots, transcendental caches,
/// the default random state and the interrupt flag.
use crate::bytecode::Function;
use crate::compiler;
use crate::conf::Config;
use crate::core::object::ObjType;
use crate::core::random::RandState;
use crate::core::transc::TranscCache;
use crate::core::value::{display, PrintStyle, Value};
use crate::errors::{CalcError, ErrorVal};
use crate::parser::Parser;
use crate::vm::Vm;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

pub struct Engine {
    pub conf: Config,
    pub globals: HashMap<String, Value>,
    pub funcs: HashMap<String, Rc<Function>>,
    pub obj_types: Vec<ObjType>,
    obj_index: HashMap<String, usize>,
    pub statics: Vec<Value>,
    pub static_inited: Vec<bool>,
    static_slots: HashMap<String, u32>,
    pub transc: TranscCache,
    pub rand: RandState,
    interrupt: Arc<AtomicBool>,
    next_file_id: u64,
    /// File permission bits from -m: 1 read, 2 write, 4 execute scripts.
    pub file_perm: u32,
    /// -C: whether native-extension builtins may be registered.
    pub allow_custom: bool,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            conf: Config::default(),
            globals: HashMap::new(),
            funcs: HashMap::new(),
            obj_types: Vec::new(),
            obj_index: HashMap::new(),
            statics: Vec::new(),
            static_inited: Vec::new(),
            static_slots: HashMap::new(),
            transc: TranscCache::new(),
            rand: RandState::new(0x6162_6163_7573), // fixed default; srand reseeds
            interrupt: Arc::new(AtomicBool::new(false)),
            next_file_id: 3, // 0..2 read as the standard streams
            file_perm: 7,
            allow_custom: false,
        }
    }

    // -----------------------------------------------------------------------
    // Interrupts
    // -----------------------------------------------------------------------

    /// Shared flag for the embedding shell to set on user interrupt; the VM
    /// polls it at backward branches and calls.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn take_interrupt(&self) -> bool {
        self.interrupt
            .swap(false, std::sync::atomic::Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Object types
    // -----------------------------------------------------------------------

    /// Registering the same name with identical fields is a no-op;
    /// changing the field list is a redefinition error.
    pub fn define_obj_type(&mut self, name: &str, fields: Vec<String>) -> Result<usize, String> {
        if let Some(&id) = self.obj_index.get(name) {
            if self.obj_types[id].fields == fields {
                return Ok(id);
            }
            return Err(format!("object type '{}' already defined with different fields", name));
        }
        let id = self.obj_types.len();
        self.obj_types.push(ObjType {
            id,
            name: name.to_string(),
            fields,
        });
        self.obj_index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn obj_type_id(&self, name: &str) -> Option<usize> {
        self.obj_index.get(name).copied()
    }

    // -----------------------------------------------------------------------
    // Static slots
    // -----------------------------------------------------------------------

    pub fn alloc_static(&mut self, key: &str) -> u32 {
        if let Some(&slot) = self.static_slots.get(key) {
            return slot;
        }
        let slot = self.statics.len() as u32;
        self.statics.push(Value::Null);
        self.static_inited.push(false);
        self.static_slots.insert(key.to_string(), slot);
        slot
    }

    pub fn lookup_static(&self, key: &str) -> Option<u32> {
        self.static_slots.get(key).copied()
    }

    pub fn next_file_id(&mut self) -> u64 {
        let id = self.next_file_id;
        self.next_file_id += 1;
        id
    }

    // -----------------------------------------------------------------------
    // Execution entry points
    // -----------------------------------------------------------------------

    /// Parse, compile and run a chunk of source. `interactive` controls
    /// whether top-level expression values are echoed.
    pub fn run_source(&mut self, source: &str, interactive: bool) -> Result<Value, CalcError> {
        let items = Parser::new(source)?.parse()?;
        let main = compiler::compile_items(self, &items, interactive)?;
        let mut vm = Vm::new();
        vm.run(self, main).map_err(CalcError::Uncaught)
    }

    /// Call a registered function by name (used by print overrides and the
    /// eval-style builtins).
    pub fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<Value, ErrorVal> {
        let func = self
            .funcs
            .get(name)
            .cloned()
            .ok_or_else(|| ErrorVal::with_msg(crate::errors::E_UNDEFFUNC, format!("undefined function '{}'", name)))?;
        let mut vm = Vm::new();
        vm.run_with_args(self, func, args)
    }

    pub fn display_value(&self, v: &Value) -> String {
        display(v, &self.conf, PrintStyle::Normal, &self.obj_types)
    }

    pub fn display_value_styled(&self, v: &Value, style: PrintStyle) -> String {
        display(v, &self.conf, style, &self.obj_types)
    }
}
