//! Interpreter loop driving a single invocation.
//!
//! Each step fetches the instruction at the cursor, dispatches it through
//! [`InstructionHandlers`] and acts on the returned [`Step`]. Throwables are
//! matched against the method's exception table before the invocation
//! gives up on them.
use tracing::{debug, trace};

use crate::context::{ExecutionContext, Step};
use crate::error::{VmError, VmResult};
use crate::handlers::InstructionHandlers;
use crate::value::{ObjectRef, Value};

/// Runs `context` until its method returns or fails.
pub(crate) fn execute(context: &mut ExecutionContext) -> VmResult<Option<Value>> {
    let method = context.method();
    let handlers = InstructionHandlers::get();
    let budget = context.vm().config().max_steps();
    let mut steps: u64 = 0;

    loop {
        let position = context.next_cursor();
        let instruction = method.instructions().get(position).ok_or_else(|| {
            VmError::invalid(format!("{method} ran past its last instruction at {position}"))
        })?;
        if budget.is_some_and(|max| steps >= max) {
            return Err(VmError::StepBudgetExhausted { steps }.at(position, instruction.mnemonic()));
        }
        steps += 1;
        context.vm().count_dispatch();
        trace!(
            position,
            opcode = instruction.mnemonic(),
            depth = context.depth(),
            "dispatch"
        );

        let step = handlers
            .handler(instruction.opcode())
            .process(instruction, context)
            .map_err(|err| err.at(position, instruction.mnemonic()))?;
        match step {
            Step::Continue => {}
            Step::Completed => return context.take_result(),
            Step::Threw(throwable) => {
                catch(context, position, throwable)
                    .map_err(|err| err.at(position, instruction.mnemonic()))?;
            }
        }
    }
}

/// Scans the exception table in declaration order and moves the cursor to
/// the first handler covering `position` whose catch type the throwable is
/// an instance of.
fn catch(context: &mut ExecutionContext, position: usize, throwable: ObjectRef) -> VmResult<()> {
    let method = context.method();
    for block in method.try_catch() {
        if !block.covers(position) {
            continue;
        }
        let matches = match &block.catch_type {
            None => true,
            Some(catch_type) => throwable.class().is_subclass_of(catch_type)?,
        };
        if matches {
            debug!(
                method = %method,
                position,
                handler = block.handler.0,
                exception = %throwable.class(),
                "exception caught"
            );
            context.clear();
            context.push(Value::Object(throwable))?;
            context.jump(block.handler);
            return Ok(());
        }
    }
    debug!(method = %method, position, exception = %throwable, "uncaught exception");
    Err(VmError::Uncaught(throwable))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::access::{ACC_PUBLIC, ACC_STATIC};
    use crate::bootstrap::ARITHMETIC_EXCEPTION;
    use crate::bytecode::*;
    use crate::compiler::StandardCompiler;
    use crate::config::VmConfig;
    use crate::error::ErrorKind;
    use crate::member::Method;
    use crate::source::{ClassNode, MemorySource, MethodNode, TryCatchNode};
    use crate::vm::VirtualMachine;

    fn load(methods: Vec<MethodNode>, config: VmConfig) -> Arc<VirtualMachine> {
        let class = methods.into_iter().fold(
            ClassNode::new("demo/Calc", Some("java/lang/Object"), ACC_PUBLIC),
            ClassNode::method,
        );
        VirtualMachine::with_config(MemorySource::new().with(class), StandardCompiler, config)
    }

    fn method(vm: &VirtualMachine, name: &str, descriptor: &str) -> Arc<Method> {
        vm.find_method("demo/Calc", name, descriptor).unwrap()
    }

    fn add() -> MethodNode {
        MethodNode::new("add", "(II)I", ACC_PUBLIC).code(
            2,
            3,
            vec![
                Instruction::local(ILOAD, 1),
                Instruction::local(ILOAD, 2),
                Instruction::new(IADD),
                Instruction::new(IRETURN),
            ],
        )
    }

    /// `static int divide(int a, int b)` guarded by a handler for
    /// `catch_type` that returns -1.
    fn guarded_divide(catch_type: Option<&str>) -> MethodNode {
        MethodNode::new("divide", "(II)I", ACC_PUBLIC | ACC_STATIC)
            .code(
                2,
                2,
                vec![
                    Instruction::new(ILOAD_0),
                    Instruction::new(ILOAD_1),
                    Instruction::new(IDIV),
                    Instruction::new(IRETURN),
                    Instruction::new(POP),
                    Instruction::new(ICONST_M1),
                    Instruction::new(IRETURN),
                ],
            )
            .try_catch(TryCatchNode::new(0, 3, 4, catch_type))
    }

    #[test]
    fn adds_two_ints() {
        let vm = load(vec![add()], VmConfig::default());
        let add = method(&vm, "add", "(II)I");
        let this = Value::from("receiver");
        let result = add.invoke(Some(this), &[Value::Int(3), Value::Int(4)]).unwrap();
        assert_eq!(result, Some(Value::Int(7)));
        assert_eq!(vm.instructions_dispatched(), 4);
    }

    #[test]
    fn null_receiver_dispatches_nothing() {
        let vm = load(vec![add()], VmConfig::default());
        let add = method(&vm, "add", "(II)I");
        let err = add.invoke(None, &[Value::Int(3), Value::Int(4)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(matches!(
            add.invoke(Some(Value::Null), &[Value::Int(1), Value::Int(2)]),
            Err(VmError::NullInstance { .. })
        ));
        assert_eq!(vm.instructions_dispatched(), 0);
    }

    #[test]
    fn runs_decoded_factorial() {
        // static int fact(int n) { int r = 1; for (int i = 2; i <= n; i++) r *= i; return r; }
        // with n in local 0 after the prologue stores
        let code = [
            4, 60, 5, 61, 28, 26, 163, 0, 13, 27, 28, 104, 60, 132, 2, 1, 167, 255, 244, 27, 172,
        ];
        let instructions = decode(&code, &ConstantPool::new()).unwrap().into_instructions();
        let fact =
            MethodNode::new("fact", "(I)I", ACC_PUBLIC | ACC_STATIC).code(2, 3, instructions);
        let vm = load(vec![fact], VmConfig::default());
        let fact = method(&vm, "fact", "(I)I");
        assert_eq!(fact.invoke(None, &[Value::Int(5)]).unwrap(), Some(Value::Int(120)));
        assert_eq!(fact.invoke(None, &[Value::Int(1)]).unwrap(), Some(Value::Int(1)));
    }

    #[test]
    fn unsupported_opcodes_carry_their_position() {
        // bipush 12; invokestatic #7; istore_1; getstatic #13; iload_1; invokevirtual #19; return
        let code = [16, 12, 184, 0, 7, 60, 178, 0, 13, 27, 182, 0, 19, 177];
        let member = |name: &str, descriptor: &str| {
            PoolEntry::Member(MemberRef {
                owner: "demo/Main".into(),
                name: name.into(),
                descriptor: descriptor.into(),
            })
        };
        let pool = ConstantPool::new()
            .with(7, member("square", "(I)I"))
            .with(13, member("out", "Ljava/io/PrintStream;"))
            .with(19, member("println", "(I)V"));
        let instructions = decode(&code, &pool).unwrap().into_instructions();
        let main = MethodNode::new("main", "()V", ACC_PUBLIC | ACC_STATIC).code(2, 2, instructions);
        let vm = load(vec![main], VmConfig::default());
        let err = method(&vm, "main", "()V").invoke(None, &[]).unwrap_err();
        assert_eq!(err.position(), Some(1));
        assert!(matches!(
            err.root(),
            VmError::UnsupportedOpcode { opcode: INVOKESTATIC, .. }
        ));
    }

    #[test]
    fn handler_catches_matching_exception() {
        let vm = load(vec![guarded_divide(Some(ARITHMETIC_EXCEPTION))], VmConfig::default());
        let divide = method(&vm, "divide", "(II)I");
        let quotient = |a, b| divide.invoke(None, &[Value::Int(a), Value::Int(b)]).unwrap();
        assert_eq!(quotient(9, 3), Some(Value::Int(3)));
        assert_eq!(quotient(9, 0), Some(Value::Int(-1)));
    }

    #[test]
    fn handler_for_a_superclass_catches() {
        for catch_type in [Some("java/lang/RuntimeException"), Some("java/lang/Throwable"), None] {
            let vm = load(vec![guarded_divide(catch_type)], VmConfig::default());
            let divide = method(&vm, "divide", "(II)I");
            assert_eq!(
                divide.invoke(None, &[Value::Int(1), Value::Int(0)]).unwrap(),
                Some(Value::Int(-1)),
                "{catch_type:?}"
            );
        }
    }

    #[test]
    fn unrelated_handler_lets_it_escape() {
        let vm = load(
            vec![guarded_divide(Some("java/lang/NullPointerException"))],
            VmConfig::default(),
        );
        let divide = method(&vm, "divide", "(II)I");
        let err = divide.invoke(None, &[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Simulation);
        assert_eq!(err.position(), Some(2));
        match err.root() {
            VmError::Uncaught(throwable) => {
                assert_eq!(throwable.to_string(), "java/lang/ArithmeticException: / by zero")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decoded_exception_table_routes_to_its_handler() {
        // static int share(int b) {
        //     try { return 100 / b; } catch (ArithmeticException e) { return -1; }
        // }
        let code = [BIPUSH, 100, ILOAD_0, IDIV, IRETURN, ASTORE_1, ICONST_M1, IRETURN];
        let decoded = decode(&code, &ConstantPool::new()).unwrap();
        let block = decoded.try_catch(0, 5, 5, Some(ARITHMETIC_EXCEPTION)).unwrap();
        let share = MethodNode::new("share", "(I)I", ACC_PUBLIC | ACC_STATIC)
            .code(2, 2, decoded.into_instructions())
            .try_catch(block);
        let vm = load(vec![share], VmConfig::default());
        let share = method(&vm, "share", "(I)I");
        assert_eq!(share.invoke(None, &[Value::Int(4)]).unwrap(), Some(Value::Int(25)));
        assert_eq!(share.invoke(None, &[Value::Int(0)]).unwrap(), Some(Value::Int(-1)));
    }

    #[test]
    fn step_budget_stops_runaway_loops() {
        let spin = MethodNode::new("spin", "()V", ACC_PUBLIC | ACC_STATIC)
            .code(0, 0, vec![Instruction::jump(GOTO, 0)]);
        let vm = load(vec![spin], VmConfig::default().with_max_steps(100));
        let err = method(&vm, "spin", "()V").invoke(None, &[]).unwrap_err();
        assert!(matches!(err.root(), VmError::StepBudgetExhausted { steps: 100 }));
        assert_eq!(vm.instructions_dispatched(), 100);
    }

    #[test]
    fn falling_off_the_end_is_invalid() {
        let run_on = MethodNode::new("runOn", "()V", ACC_PUBLIC | ACC_STATIC)
            .code(0, 0, vec![Instruction::new(NOP)]);
        let vm = load(vec![run_on], VmConfig::default());
        let err = method(&vm, "runOn", "()V").invoke(None, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBytecode);
    }

    #[test]
    fn long_arguments_take_two_slots() {
        // static long mix(long a, int b) { return a + b; }
        let mix = MethodNode::new("mix", "(JI)J", ACC_PUBLIC | ACC_STATIC).code(
            4,
            3,
            vec![
                Instruction::new(LLOAD_0),
                Instruction::new(ILOAD_2),
                Instruction::new(I2L),
                Instruction::new(LADD),
                Instruction::new(LRETURN),
            ],
        );
        let vm = load(vec![mix], VmConfig::default());
        let mix = method(&vm, "mix", "(JI)J");
        assert_eq!(
            mix.invoke(None, &[Value::Long(1 << 33), Value::Int(-1)]).unwrap(),
            Some(Value::Long((1 << 33) - 1))
        );

        let err = mix.invoke(None, &[Value::Int(1), Value::Int(-1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(vm.instructions_dispatched(), 5);
    }

    #[test]
    fn argument_count_is_checked() {
        let vm = load(vec![add()], VmConfig::default());
        let err = method(&vm, "add", "(II)I")
            .invoke(Some(Value::from("receiver")), &[Value::Int(1)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }
}
