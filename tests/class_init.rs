mod common;

use std::rc::Rc;

use pretty_assertions::assert_eq;

use symbolic_jvm::engine::clinit::{ensure_klass, ClassInit, ClassInitializer};
use symbolic_jvm::engine::decision::{DecisionError, DecisionOracle, FixedOracle, PathConditionOracle,
                                     ScriptedOracle};
use symbolic_jvm::engine::throwable::Throwable;
use symbolic_jvm::engine::EngineError;
use symbolic_jvm::model::class_file::access_flags::{field_access_flags, method_access_flags};
use symbolic_jvm::model::class_file::{ClassFileBuilder, Code, MethodInfo};
use symbolic_jvm::vm::bytecode::opcode;
use symbolic_jvm::vm::class_hierarchy::JAVA_LANG_OBJECT;
use symbolic_jvm::vm::{self, ClassHierarchy, Clause, KlassStatus, State, Unwinding, Value};

use common::*;

/// `p/C` extends `p/B` extends `p/A`, each with a class initializer.
fn chain() -> ClassHierarchy {
    let mut hierarchy = ClassHierarchy::bootstrap();
    hierarchy.add(ClassFileBuilder::new("p/A").method(clinit()).build());
    hierarchy.add(ClassFileBuilder::new("p/B").super_class(Some("p/A")).method(clinit()).build());
    hierarchy.add(ClassFileBuilder::new("p/C").super_class(Some("p/B")).method(clinit()).build());
    hierarchy
}

fn status(state: &State, class: &str) -> Option<KlassStatus> {
    state.klass(class).map(|klass| klass.status())
}

fn instances_of(state: &State, class: &str) -> usize {
    state.heap().iter().filter(|&(_, object)| object.class_name() == class).count()
}

#[test]
fn ancestor_initializers_run_first() {
    let mut state = running(chain(), driver());
    assert!(ensure_klass(&mut state, "p/C", &mut FixedOracle(false)).unwrap());

    assert_eq!(stack_signatures(&state), vec![
        "p/A.<clinit>()V",
        "p/B.<clinit>()V",
        "p/C.<clinit>()V",
        "test/Driver.run()V",
    ]);
    assert_eq!(status(&state, JAVA_LANG_OBJECT), Some(KlassStatus::Initialized));
    assert_eq!(status(&state, "p/A"), Some(KlassStatus::Initializing));
    assert_eq!(status(&state, "p/C"), Some(KlassStatus::Initializing));
    assert_eq!(state.path_condition().clauses(), &[
        Clause::AssumeClassNotInitialized(String::from("p/C")),
        Clause::AssumeClassNotInitialized(String::from("p/B")),
        Clause::AssumeClassNotInitialized(String::from("p/A")),
        Clause::AssumeClassNotInitialized(String::from(JAVA_LANG_OBJECT)),
    ][..]);
}

#[test]
fn completed_initializers_mark_their_class_initialized() {
    let mut state = running(chain(), driver());
    ensure_klass(&mut state, "p/C", &mut FixedOracle(false)).unwrap();

    state.complete_current_frame(None).unwrap();
    assert_eq!(status(&state, "p/A"), Some(KlassStatus::Initialized));
    assert_eq!(status(&state, "p/B"), Some(KlassStatus::Initializing));
    state.complete_current_frame(None).unwrap();
    state.complete_current_frame(None).unwrap();
    assert_eq!(status(&state, "p/C"), Some(KlassStatus::Initialized));

    // the driver resumes at the instruction that triggered the initialization
    let frame = state.current_frame().unwrap();
    assert_eq!(frame.signature(), &root_signature());
    assert_eq!(frame.pc(), 0);
}

#[test]
fn classes_without_initializers_push_nothing() {
    let mut hierarchy = ClassHierarchy::bootstrap();
    hierarchy.add(ClassFileBuilder::new("p/Plain").build());
    let mut state = running(hierarchy, driver());

    assert!(!ensure_klass(&mut state, "p/Plain", &mut FixedOracle(false)).unwrap());
    assert_eq!(state.stack_height(), 1);
    assert_eq!(status(&state, "p/Plain"), Some(KlassStatus::Initialized));
}

#[test]
fn second_call_changes_nothing() {
    let mut state = running(chain(), driver());
    assert!(ensure_klass(&mut state, "p/C", &mut FixedOracle(false)).unwrap());
    let static_store = state.static_store().clone();
    let path_condition = state.path_condition().clone();
    let height = state.stack_height();

    let mut oracle = ScriptedOracle::new(false);
    assert!(!ensure_klass(&mut state, "p/C", &mut oracle).unwrap());
    assert_eq!(state.static_store(), &static_store);
    assert_eq!(state.path_condition(), &path_condition);
    assert_eq!(state.stack_height(), height);
    assert!(oracle.queries().is_empty());
}

#[test]
fn initialized_branch_gets_symbolic_statics() {
    let mut hierarchy = ClassHierarchy::bootstrap();
    let mut builder = ClassFileBuilder::new("p/Config");
    let seven = builder.integer(7);
    hierarchy.add(builder
        .constant_field("SEVEN", "I", seven)
        .field(field_access_flags::ACC_STATIC, "count", "I")
        .field(field_access_flags::ACC_STATIC, "next", "Lp/Config;")
        .method(clinit())
        .build());
    let mut state = running(hierarchy, driver());

    assert!(!ensure_klass(&mut state, "p/Config", &mut FixedOracle(true)).unwrap());
    assert_eq!(state.stack_height(), 1);
    assert_eq!(status(&state, "p/Config"), Some(KlassStatus::Initialized));
    assert_eq!(state.get_static("p/Config", "SEVEN"), Ok(Value::Int(7)));
    match state.get_static("p/Config", "count") {
        Ok(Value::Symbol(ref symbol)) => assert_eq!(symbol.origin, "p/Config.count"),
        other => panic!("expected a symbol, got {:?}", other),
    }
    match state.get_static("p/Config", "next") {
        Ok(Value::Reference(vm::Reference::Symbolic(ref symbolic))) => {
            assert_eq!(symbolic.static_type, "p/Config");
        },
        other => panic!("expected a symbolic reference, got {:?}", other),
    }
    assert_eq!(state.path_condition().clauses(), &[
        Clause::AssumeClassInitialized(String::from(JAVA_LANG_OBJECT)),
        Clause::AssumeClassInitialized(String::from("p/Config")),
    ][..]);
}

#[test]
fn initialized_superclass_stops_the_chain() {
    let mut state = running(chain(), driver());
    let mut oracle = ScriptedOracle::new(false).answer("p/A", true);

    assert!(ensure_klass(&mut state, "p/C", &mut oracle).unwrap());
    assert_eq!(stack_signatures(&state), vec![
        "p/B.<clinit>()V",
        "p/C.<clinit>()V",
        "test/Driver.run()V",
    ]);
    assert_eq!(oracle.queries(), &[String::from("p/C"), String::from("p/B"), String::from("p/A")][..]);
    assert_eq!(status(&state, "p/A"), Some(KlassStatus::Initialized));
}

fn enum_hierarchy() -> ClassHierarchy {
    let mut hierarchy = ClassHierarchy::bootstrap();
    hierarchy.add(ClassFileBuilder::new("p/Color")
        .super_class(Some("java/lang/Enum"))
        .method(clinit())
        .build());
    hierarchy
}

#[test]
fn enums_are_never_assumed_initialized() {
    let mut state = running(enum_hierarchy(), driver());
    let mut oracle = ScriptedOracle::new(true);

    assert!(ensure_klass(&mut state, "p/Color", &mut oracle).unwrap());
    assert_eq!(stack_signatures(&state), vec!["p/Color.<clinit>()V", "test/Driver.run()V"]);
    // neither the enum nor java/lang/Enum is asked about
    assert_eq!(oracle.queries(), &[String::from(JAVA_LANG_OBJECT)][..]);
}

#[test]
fn enum_forcing_can_be_switched_off() {
    let mut state = running(enum_hierarchy(), driver());
    let mut oracle = ScriptedOracle::new(true);
    let initializer = ClassInitializer { force_enum_initializers: false, ..ClassInitializer::default() };

    assert!(!initializer.ensure_klass(&mut state, "p/Color", &mut oracle).unwrap());
    assert_eq!(oracle.queries(), &[String::from("p/Color")][..]);
    assert_eq!(state.stack_height(), 1);
}

/// `chain()`, except that `p/A` has a `ConstantValue` pointing outside its constant pool.
fn broken_ancestor() -> ClassHierarchy {
    let mut hierarchy = chain();
    hierarchy.add(ClassFileBuilder::new("p/A")
        .constant_field("LIMIT", "I", 99)
        .method(clinit())
        .build());
    hierarchy
}

#[test]
fn broken_ancestor_leaves_no_frames() {
    let mut state = running(broken_ancestor(), catching_driver());

    assert!(!ensure_klass(&mut state, "p/C", &mut FixedOracle(false)).unwrap());
    assert_eq!(state.stack_height(), 1);
    assert_eq!(instances_of(&state, "java/lang/VerifyError"), 1);
    let frame = state.current_frame().unwrap();
    assert_eq!(frame.pc(), 1);
    match frame.operand_stack() {
        [Value::Reference(reference)] =>
            assert_eq!(state.class_of(reference).unwrap(), "java/lang/VerifyError"),
        other => panic!("expected the thrown VerifyError, got {:?}", other),
    }
    // Klasses created before the failure stay
    assert_eq!(state.static_store().keys().collect::<Vec<_>>(), vec!["p/B", "p/C"]);
}

#[test]
fn created_klasses_can_be_rolled_back() {
    let mut state = running(broken_ancestor(), catching_driver());
    let initializer = ClassInitializer { rollback_klasses: true, ..ClassInitializer::default() };

    let outcome = initializer.initialize_class(&mut state, "p/C", &mut FixedOracle(false)).unwrap();
    assert_eq!(outcome, ClassInit::Failed {
        throwable: Throwable::VerifyError,
        unwinding: Unwinding::Caught { handler_pc: 1 },
    });
    assert!(state.static_store().is_empty());
}

#[test]
fn native_initializer_terminates_the_thread_with_verify_error() {
    let mut hierarchy = chain();
    hierarchy.add(ClassFileBuilder::new("p/C")
        .super_class(Some("p/B"))
        .method(MethodInfo::new(method_access_flags::ACC_STATIC | method_access_flags::ACC_NATIVE,
                                "<clinit>", "()V", None))
        .build());
    let mut state = running(hierarchy, driver());

    let outcome = ClassInitializer::default()
        .initialize_class(&mut state, "p/C", &mut FixedOracle(false))
        .unwrap();
    assert_eq!(outcome, ClassInit::Failed {
        throwable: Throwable::VerifyError,
        unwinding: Unwinding::Uncaught,
    });
    assert_eq!(state.stack_height(), 0);
    assert_eq!(instances_of(&state, "java/lang/VerifyError"), 1);
    let uncaught = state.uncaught().unwrap();
    assert_eq!(state.class_of(uncaught).unwrap(), "java/lang/VerifyError");
}

#[test]
fn instance_initializer_named_clinit_is_incompatible() {
    let mut hierarchy = ClassHierarchy::bootstrap();
    hierarchy.add(ClassFileBuilder::new("p/Odd")
        .method(MethodInfo::new(0, "<clinit>", "()V", Some(Code::new(0, 1, vec![opcode::RETURN]))))
        .build());
    let mut state = running(hierarchy, catching_driver());

    let outcome = ClassInitializer::default()
        .initialize_class(&mut state, "p/Odd", &mut FixedOracle(false))
        .unwrap();
    assert_eq!(outcome, ClassInit::Failed {
        throwable: Throwable::IncompatibleClassChangeError,
        unwinding: Unwinding::Caught { handler_pc: 1 },
    });
    assert_eq!(state.stack_height(), 1);
}

#[test]
fn missing_superclass_is_no_class_def_found() {
    let mut hierarchy = ClassHierarchy::bootstrap();
    hierarchy.add(ClassFileBuilder::new("p/Orphan").super_class(Some("p/Missing")).build());
    let mut state = running(hierarchy, catching_driver());

    let outcome = ClassInitializer::default()
        .initialize_class(&mut state, "p/Orphan", &mut FixedOracle(false))
        .unwrap();
    assert_eq!(outcome, ClassInit::Failed {
        throwable: Throwable::NoClassDefFoundError,
        unwinding: Unwinding::Caught { handler_pc: 1 },
    });
}

#[test]
fn oracle_failure_is_a_fault() {
    let mut state = running(chain(), driver());
    let mut oracle = ScriptedOracle::new(false).fail_on("p/B");

    let result = ensure_klass(&mut state, "p/C", &mut oracle);
    assert_eq!(result, Err(EngineError::Decision(DecisionError(String::from("no answer for p/B")))));
    assert_eq!(state.stack_height(), 1);
    assert_eq!(instances_of(&state, "java/lang/VerifyError"), 0);
}

#[test]
fn heap_exhaustion_rolls_back_and_reports() {
    let mut hierarchy = chain();
    hierarchy.add(driver());
    let mut state = State::new(Rc::new(hierarchy)).with_heap_limit(Some(2));
    state.push_frame(&root_signature(), true, 0, vec![]).unwrap();

    let result = ensure_klass(&mut state, "p/C", &mut FixedOracle(false));
    assert_eq!(result, Err(EngineError::State(vm::Error::HeapMemoryExhausted)));
    assert_eq!(state.stack_height(), 1);
}

#[test]
fn path_condition_oracle_replays_recorded_assumptions() {
    let mut state = running(chain(), driver());
    assert!(!ensure_klass(&mut state, "p/A", &mut FixedOracle(true)).unwrap());
    assert!(ensure_klass(&mut state, "p/B", &mut FixedOracle(false)).unwrap());

    let path_condition = state.path_condition();
    let mut oracle = PathConditionOracle { default: true };
    assert_eq!(oracle.is_sat_initialized(path_condition, "p/A"), Ok(true));
    assert_eq!(oracle.is_sat_initialized(path_condition, "p/B"), Ok(false));
    assert_eq!(oracle.is_sat_initialized(path_condition, "p/C"), Ok(true));
    let mut oracle = PathConditionOracle { default: false };
    assert_eq!(oracle.is_sat_initialized(path_condition, "p/C"), Ok(false));

    // a branch that lost its Klasses takes the same decisions again, whatever the default
    let mut branch = state.clone();
    branch.pop_current_frame().unwrap();
    branch.remove_klass("p/A");
    branch.remove_klass("p/B");
    assert!(!ensure_klass(&mut branch, "p/A", &mut PathConditionOracle { default: false }).unwrap());
    assert_eq!(status(&branch, "p/A"), Some(KlassStatus::Initialized));
    assert!(ensure_klass(&mut branch, "p/B", &mut PathConditionOracle { default: true }).unwrap());
    assert_eq!(stack_signatures(&branch), vec!["p/B.<clinit>()V", "test/Driver.run()V"]);
}
