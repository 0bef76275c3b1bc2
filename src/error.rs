#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollateError {
    #[error("Cannot collate an empty batch")]
    EmptyBatch,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Cannot set the {0} twice. Need to reset buffer first.")]
    AlreadySet(&'static str),

    #[error("The {0} has not been set for this episode")]
    NotSet(&'static str),

    #[error("Expected each encoded step to have leading dims [1, 1], but got {dims:?}")]
    UnexpectedStepShape { dims: Vec<usize> },

    #[error("Number of observations ({observations}) does not match number of encoded observations ({encoded})")]
    LockstepMismatch { observations: usize, encoded: usize },

    #[error(transparent)]
    Collate(#[from] CollateError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Position {values:?} is outside of the discrete bins (x < {x_bins}, y < {y_bins})")]
    PositionOutOfRange {
        values: Vec<i64>,
        x_bins: i64,
        y_bins: i64,
    },

    #[error("Rotation {values:?} is outside of the discrete bins [0, {rot_bins})")]
    RotationOutOfRange { values: Vec<i64>, rot_bins: i64 },
}
