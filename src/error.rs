// One error type for the whole app.
// Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String), // Preprocessing got a buffer of the wrong shape
    #[error("Model load error: {0}")]
    ModelLoad(String), // Reading/validating the model failed
    #[error("Inference error: {0}")]
    Inference(String), // A model run failed
    #[error("Window init error: {0}")]
    WindowInit(String), // Creating the window failed
    #[error("Window update error: {0}")]
    WindowUpdate(String), // Updating the window buffer failed
    #[error("Config error: {0}")]
    Config(String), // Config file unreadable or inconsistent
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
