pub trait HumiditySensor {
    type Error;
    /// Relative humidity in percent.
    async fn relative_humidity(&mut self) -> Result<f32, Self::Error>;
}
