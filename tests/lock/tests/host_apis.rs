//! Host-API lock tests: acquisition, set/get, build, and device reads for
//! the `HostApis` program.

use std::sync::Arc;

use lock_tests::build_helpers::reference_queue;
use speck_harness::backend::ReferenceCompiler;
use speck_harness::context::{acquire_bundle, acquire_bundle_for_kernels};
use speck_harness::programs::host_apis::{
    HostApis, TestPair, EMPTY_KERNEL, READ_C2_KERNEL, READ_C3_KERNEL, SPEC_CONST_1, SPEC_CONST_2,
    SPEC_CONST_3, SPEC_CONST_4,
};
use speck_harness::queue::Queue;
use speck_harness::DispatchError;
use speck_kernel::build::BuildPipeline;
use speck_kernel::bundle::{BundleState, KernelBundle};
use speck_kernel::SpecConstError;

fn setup() -> (Queue, Arc<ReferenceCompiler>, KernelBundle) {
    let (queue, compiler) = reference_queue(&HostApis, 0).unwrap();
    let input = acquire_bundle(queue.context(), std::slice::from_ref(queue.device())).unwrap();
    (queue, compiler, input)
}

#[test]
fn equal_defaults_do_not_alias() {
    assert_eq!(SPEC_CONST_1.default_value(), SPEC_CONST_2.default_value());
    assert_ne!(SPEC_CONST_1.token(), SPEC_CONST_2.token());
    assert_ne!(SPEC_CONST_1, SPEC_CONST_2);
}

#[test]
fn overrides_are_tracked_from_acquisition() {
    let (_, _, mut input) = setup();
    assert_eq!(input.state(), BundleState::Input);
    assert!(input.contains_specialization_constants());
    assert!(input.contains(&SPEC_CONST_2));
    assert!(!input.has_override(&SPEC_CONST_2));
    assert!(input.contains(&SPEC_CONST_3));
    assert!(!input.has_override(&SPEC_CONST_3));
    assert_eq!(input.get(&SPEC_CONST_2), Ok(42));

    input.set(&SPEC_CONST_2, 1).unwrap();
    assert!(input.has_override(&SPEC_CONST_2));
    assert_eq!(input.get(&SPEC_CONST_2), Ok(1));

    input.reset(&SPEC_CONST_2).unwrap();
    assert!(!input.has_override(&SPEC_CONST_2));
    assert_eq!(input.get(&SPEC_CONST_2), Ok(42));
}

#[test]
fn cloned_input_is_a_distinct_bundle() {
    let (_, compiler, mut input) = setup();
    let copy = input.clone();
    assert_ne!(copy.id(), input.id());

    input.set(&SPEC_CONST_2, 9).unwrap();
    assert_eq!(copy.get(&SPEC_CONST_2), Ok(42));
    assert!(!copy.has_override(&SPEC_CONST_2));

    let exec = BuildPipeline::new(&*compiler).build(&input).unwrap();
    assert_eq!(exec.clone().id(), exec.id());
}

#[test]
fn undeclared_constant_cannot_be_set() {
    let (_, _, mut input) = setup();
    assert!(!input.contains(&SPEC_CONST_1));
    assert_eq!(
        input.set(&SPEC_CONST_1, 1),
        Err(SpecConstError::UnknownConstant {
            token: SPEC_CONST_1.token()
        })
    );
    assert!(!input.has_override(&SPEC_CONST_1));
}

#[test]
fn scalar_override_reaches_device_and_unused_constant_is_absent() {
    let (queue, compiler, mut input) = setup();
    input.set(&SPEC_CONST_2, 1).unwrap();
    let exec = BuildPipeline::new(&*compiler).build(&input).unwrap();
    assert_eq!(exec.state(), BundleState::Executable);

    let (c2, c1) = queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&exec)?;
            cgh.single_task(READ_C2_KERNEL, |kh| {
                (
                    kh.get_specialization_constant(&SPEC_CONST_2),
                    kh.get_specialization_constant(&SPEC_CONST_1),
                )
            })
        })
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(c2, Ok(1));
    assert_eq!(
        c1,
        Err(SpecConstError::UnknownConstant {
            token: SPEC_CONST_1.token()
        })
    );
}

#[test]
fn aggregate_override_round_trips_exactly() {
    let (queue, compiler, mut input) = setup();
    assert_eq!(input.get(&SPEC_CONST_3), Ok(TestPair { a: 42, b: 42 }));
    input.set(&SPEC_CONST_3, TestPair { a: 1, b: 2 }).unwrap();
    assert_eq!(input.get(&SPEC_CONST_3), Ok(TestPair { a: 1, b: 2 }));

    let exec = BuildPipeline::new(&*compiler).build(&input).unwrap();
    let seen = queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&exec)?;
            cgh.single_task(READ_C3_KERNEL, |kh| kh.get_specialization_constant(&SPEC_CONST_3))
        })
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(seen, Ok(TestPair { a: 1, b: 2 }));
}

#[test]
fn unset_constant_reads_default_on_device() {
    let (queue, compiler, input) = setup();
    let exec = BuildPipeline::new(&*compiler).build(&input).unwrap();
    let seen = queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&exec)?;
            cgh.single_task(READ_C2_KERNEL, |kh| kh.get_specialization_constant(&SPEC_CONST_2))
        })
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(seen, Ok(42));
}

#[test]
fn built_bundle_ignores_later_input_edits() {
    let (queue, compiler, mut input) = setup();
    input.set(&SPEC_CONST_2, 5).unwrap();
    let exec = BuildPipeline::new(&*compiler).build(&input).unwrap();

    input.set(&SPEC_CONST_2, 6).unwrap();
    assert_eq!(input.state(), BundleState::Input);
    assert_eq!(exec.get(&SPEC_CONST_2), Ok(5));

    let seen = queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&exec)?;
            cgh.single_task(READ_C2_KERNEL, |kh| kh.get_specialization_constant(&SPEC_CONST_2))
        })
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(seen, Ok(5));
}

#[test]
fn set_past_input_fails_without_mutation() {
    let (_, compiler, mut input) = setup();
    input.set(&SPEC_CONST_2, 7).unwrap();
    let pipeline = BuildPipeline::new(&*compiler);

    let mut object = pipeline.compile(&input).unwrap();
    let err = object.set(&SPEC_CONST_2, 8).unwrap_err();
    assert!(matches!(err, SpecConstError::InvalidState { .. }));
    assert_eq!(object.get(&SPEC_CONST_2), Ok(7));

    let mut exec = pipeline.link(&object).unwrap();
    assert!(matches!(
        exec.set(&SPEC_CONST_2, 8),
        Err(SpecConstError::InvalidState { .. })
    ));
    assert!(matches!(
        exec.reset(&SPEC_CONST_2),
        Err(SpecConstError::InvalidState { .. })
    ));
    assert_eq!(exec.get(&SPEC_CONST_2), Ok(7));
    assert!(exec.store().is_frozen());
}

#[test]
fn handler_level_specialization_reaches_device() {
    let (queue, compiler, _) = setup();
    let seen = queue
        .submit(|cgh| {
            cgh.set_specialization_constant(&SPEC_CONST_3, TestPair { a: 1, b: 2 })?;
            assert_eq!(cgh.get_specialization_constant(&SPEC_CONST_4)?, 42);
            assert_eq!(
                cgh.get_specialization_constant(&SPEC_CONST_3)?,
                TestPair { a: 1, b: 2 }
            );
            cgh.single_task(READ_C3_KERNEL, |kh| kh.get_specialization_constant(&SPEC_CONST_3))
        })
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(seen, Ok(TestPair { a: 1, b: 2 }));
    assert_eq!(compiler.compile_calls(), 1);
    assert_eq!(compiler.link_calls(), 1);
}

#[test]
fn handler_level_set_of_foreign_constant_fails() {
    let (queue, _, _) = setup();
    let err = queue
        .submit(|cgh| {
            cgh.set_specialization_constant(&SPEC_CONST_2, 3)?;
            cgh.single_task(READ_C3_KERNEL, |kh| kh.get_specialization_constant(&SPEC_CONST_3))
        })
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::Spec(SpecConstError::UnknownConstant {
            token: SPEC_CONST_2.token()
        })
    );
}

#[test]
fn kernel_selection_without_constants() {
    let (queue, compiler, _) = setup();
    let input = acquire_bundle_for_kernels(
        queue.context(),
        std::slice::from_ref(queue.device()),
        &[EMPTY_KERNEL],
    )
    .unwrap();
    assert!(!input.contains_specialization_constants());
    assert_eq!(input.kernel_names(), vec![EMPTY_KERNEL]);

    let exec = BuildPipeline::new(&*compiler).build(&input).unwrap();
    queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&exec)?;
            cgh.single_task(EMPTY_KERNEL, |kh| assert_eq!(kh.kernel_name(), EMPTY_KERNEL))
        })
        .unwrap()
        .wait()
        .unwrap();
}

#[test]
fn input_bundle_cannot_be_dispatched() {
    let (queue, _, input) = setup();
    let err = queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&input)?;
            cgh.single_task(READ_C2_KERNEL, |_| ())
        })
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Spec(SpecConstError::InvalidState { .. })
    ));
}

#[test]
fn bundle_built_for_other_device_is_rejected() {
    let (cpu_queue, compiler, _) = setup();
    let (gpu_queue, _) = reference_queue(&HostApis, 1).unwrap();
    let on_gpu =
        acquire_bundle(gpu_queue.context(), std::slice::from_ref(gpu_queue.device())).unwrap();
    let exec = BuildPipeline::new(&*compiler).build(&on_gpu).unwrap();

    let err = cpu_queue
        .submit(|cgh| {
            cgh.use_kernel_bundle(&exec)?;
            cgh.single_task(READ_C2_KERNEL, |_| ())
        })
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Spec(SpecConstError::InvalidState { .. })
    ));
}
