/// The person moving the arm between calibration phases.
pub trait Operator {
    /// Show `prompt` and block until the operator confirms.
    fn pause(&mut self, prompt: &str) -> std::io::Result<()>;
}

impl<F> Operator for F
where
    F: FnMut(&str) -> std::io::Result<()>,
{
    fn pause(&mut self, prompt: &str) -> std::io::Result<()> {
        self(prompt)
    }
}
