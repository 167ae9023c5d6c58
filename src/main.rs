use cortado::access::{ACC_PUBLIC, ACC_STATIC};
use cortado::bytecode::{decode, ConstantPool, Instruction, IADD, ILOAD_0, ILOAD_1, IRETURN};
use cortado::compiler::StandardCompiler;
use cortado::config::VmConfig;
use cortado::source::{ClassNode, MemorySource, MethodNode};
use cortado::{Value, VirtualMachine, VmResult};
use std::env;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const CLASS: &str = "demo/Arith";

// static int fact(int n), as emitted by javac.
const FACTORIAL: [u8; 21] = [
    4, 60, 5, 61, 28, 26, 163, 0, 13, 27, 28, 104, 60, 132, 2, 1, 167, 255, 244, 27, 172,
];

fn demo_class() -> VmResult<ClassNode> {
    let fact = MethodNode::new("fact", "(I)I", ACC_PUBLIC | ACC_STATIC).code(
        2,
        3,
        decode(&FACTORIAL, &ConstantPool::new())?.into_instructions(),
    );
    let add = MethodNode::new("add", "(II)I", ACC_PUBLIC | ACC_STATIC).code(
        2,
        2,
        vec![
            Instruction::new(ILOAD_0),
            Instruction::new(ILOAD_1),
            Instruction::new(IADD),
            Instruction::new(IRETURN),
        ],
    );
    Ok(ClassNode::new(CLASS, Some("java/lang/Object"), ACC_PUBLIC)
        .method(fact)
        .method(add))
}

fn run(name: &str, args: &[i32]) -> VmResult<Option<Value>> {
    let source = MemorySource::new().with(demo_class()?);
    let vm = VirtualMachine::with_config(source, StandardCompiler, VmConfig::from_env());
    let descriptor = format!("({})I", "I".repeat(args.len()));
    let method = vm.find_method(CLASS, name, &descriptor)?;
    let args: Vec<Value> = args.iter().copied().map(Value::Int).collect();
    let result = method.invoke(None, &args)?;
    tracing::info!(
        dispatched = vm.instructions_dispatched(),
        "{name}{descriptor} finished"
    );
    Ok(result)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut argv = env::args().skip(1);
    let name = argv.next().unwrap_or_else(|| "fact".to_string());
    let args: Result<Vec<i32>, _> = argv.map(|arg| arg.parse::<i32>()).collect();
    let args = match args {
        Ok(args) if args.is_empty() && name == "fact" => vec![5],
        Ok(args) => args,
        Err(err) => {
            eprintln!("usage: cortado [fact N | add A B]: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(&name, &args) {
        Ok(Some(value)) => {
            println!("{name}{args:?} = {value:?}");
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
