use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TypesError {
    #[snafu(display("'{raw}' is not a known stage"))]
    UnknownStage { stage: &'static str, raw: String },
    #[snafu(display("correlation id '{raw}' is not a valid uuid"))]
    InvalidCorrelationId {
        stage: &'static str,
        raw: String,
        source: uuid::Error,
    },
}

pub type TypesResult<T> = Result<T, TypesError>;
