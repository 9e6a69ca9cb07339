//! End-to-end pruning runs against real artifacts on disk.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use podar::{
    Batch, DataSplit, DenseLayer, EpochHook, Model, ModelStore, PruningError, PruningRun,
    SafeTensorsStore, Tensor, TrainConfig, Trainer, FINAL_RETRAIN_EPOCHS,
};
use tempfile::TempDir;

/// Trainer stub: nudges every weight each epoch, then invokes the hook.
struct NudgeTrainer {
    nudge: f32,
    fits: Rc<RefCell<Vec<usize>>>,
}

impl NudgeTrainer {
    fn new(nudge: f32) -> (Self, Rc<RefCell<Vec<usize>>>) {
        let fits = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                nudge,
                fits: Rc::clone(&fits),
            },
            fits,
        )
    }
}

impl Trainer for NudgeTrainer {
    fn prepare(&mut self, _config: &TrainConfig) -> Result<(), PruningError> {
        Ok(())
    }

    fn fit(
        &mut self,
        model: &mut Model,
        _data: &DataSplit,
        _config: &TrainConfig,
        epochs: usize,
        hook: &mut dyn EpochHook,
    ) -> Result<(), PruningError> {
        for epoch in 0..epochs {
            for param in model.parameters_mut() {
                for w in param.data_mut() {
                    *w += self.nudge;
                }
            }
            hook.on_epoch_end(epoch, model)?;
        }
        self.fits.borrow_mut().push(epochs);
        Ok(())
    }
}

fn split() -> DataSplit {
    DataSplit::new(
        Batch::new(
            Tensor::new(&[1.0, 2.0, 3.0, 4.0], &[2, 2]),
            Tensor::new(&[1.0, 0.0], &[2, 1]),
        ),
        Batch::new(
            Tensor::new(&[5.0, 6.0], &[1, 2]),
            Tensor::new(&[1.0], &[1, 1]),
        ),
    )
}

fn write_model(dir: &Path) -> std::path::PathBuf {
    let l0 = DenseLayer::new(
        Tensor::new(&[0.5, 0.01, 0.3, 0.2, 0.7, 0.9], &[3, 2]),
        Some(Tensor::from_slice(&[0.1, 0.2, 0.3])),
    )
    .unwrap();
    let l1 = DenseLayer::new(Tensor::new(&[0.4, 0.6, 0.8], &[1, 3]), None).unwrap();
    let model = Model::new(vec![l0, l1]);

    let path = dir.join("net.safetensors");
    SafeTensorsStore::new().save(&model, &path).unwrap();
    path
}

#[test]
fn prune_with_retraining_writes_reloadable_artifact() {
    let dir = TempDir::new().unwrap();
    let path = write_model(dir.path());
    let (trainer, fits) = NudgeTrainer::new(0.0);

    let mut run = PruningRun::new(&path, split(), SafeTensorsStore::new(), trainer).unwrap();
    assert_eq!(run.initial_weights(), 12);

    let report = run.prune_layer(0, 0.25, 4).unwrap();

    // 0.01 and 0.2 go; 0.3 stops the loop.
    assert_eq!(report.pruned, 2);
    assert_eq!(report.remaining, 10);
    assert_eq!(*fits.borrow(), vec![4, 4, FINAL_RETRAIN_EPOCHS]);
    assert_eq!(
        report.artifact,
        dir.path().join("Remaining_weights10_noretrain_net.safetensors")
    );
    assert!(report.artifact.exists());

    // The source artifact is untouched.
    let original = SafeTensorsStore::new().load(&path).unwrap();
    assert_eq!(
        original.parameters()[0].data(),
        &[0.5, 0.01, 0.3, 0.2, 0.7, 0.9]
    );

    // The saved artifact reloads with the pruned positions at zero.
    let pruned = SafeTensorsStore::new().load(&report.artifact).unwrap();
    let weights = pruned.parameters()[0].data();
    assert_eq!(weights[1], 0.0);
    assert_eq!(weights[3], 0.0);
    assert_ne!(weights[0], 0.0);
}

#[test]
fn retraining_cannot_revive_pruned_weights() {
    let dir = TempDir::new().unwrap();
    let path = write_model(dir.path());
    let (trainer, _) = NudgeTrainer::new(0.5);

    let mut run = PruningRun::new(&path, split(), SafeTensorsStore::new(), trainer).unwrap();
    let report = run.prune_layer(0, 0.25, 3).unwrap();

    let pruned = SafeTensorsStore::new().load(&report.artifact).unwrap();
    let weights = pruned.parameters()[0].data();
    let mask = &run.mask().masks()[0];
    for (w, m) in weights.iter().zip(mask.data()) {
        if *m == 0.0 {
            assert_eq!(*w, 0.0);
        }
    }
}

#[test]
fn successive_calls_stack_artifacts_without_overwriting() {
    let dir = TempDir::new().unwrap();
    let path = write_model(dir.path());
    let (trainer, _) = NudgeTrainer::new(0.0);

    let mut run = PruningRun::new(&path, split(), SafeTensorsStore::new(), trainer).unwrap();

    let first = run.prune_layer_no_retraining(0, 0.25).unwrap();
    let second = run.prune_layer_no_retraining(2, 0.5).unwrap();

    assert!(first.remaining >= second.remaining);
    assert!(first.artifact.exists());
    assert!(second.artifact.exists());
    assert_ne!(first.artifact, second.artifact);
    assert!(path.exists());
}

#[test]
fn propagate_persists_derived_mask() {
    let dir = TempDir::new().unwrap();

    // Slot 0 feeds slot 2 (slot 1 is the bias of layer 0).
    let l0 = DenseLayer::new(
        Tensor::new(&[0.01, 0.02, 0.5, 0.6], &[2, 2]),
        Some(Tensor::from_slice(&[0.0, 0.0])),
    )
    .unwrap();
    let l1 = DenseLayer::new(Tensor::new(&[0.7, 0.8], &[1, 2]), None).unwrap();
    let path = dir.path().join("chain.safetensors");
    SafeTensorsStore::new()
        .save(&Model::new(vec![l0, l1]), &path)
        .unwrap();

    let (trainer, _) = NudgeTrainer::new(0.0);
    let mut run = PruningRun::new(&path, split(), SafeTensorsStore::new(), trainer).unwrap();

    // Kill output unit 0 of layer 0 entirely, then propagate.
    run.prune_layer_no_retraining(0, 0.1).unwrap();
    let artifact = run.propagate_pruning(0, 2).unwrap();

    let model = SafeTensorsStore::new().load(&artifact).unwrap();
    assert_eq!(model.parameters()[2].data(), &[0.0, 0.8]);
}

#[test]
fn load_failure_is_fatal_at_construction() {
    let dir = TempDir::new().unwrap();
    let (trainer, _) = NudgeTrainer::new(0.0);

    let result = PruningRun::new(
        dir.path().join("missing.safetensors"),
        split(),
        SafeTensorsStore::new(),
        trainer,
    );
    assert!(matches!(result, Err(PruningError::Load { .. })));
}
