use anyhow::Context;
use clap::Parser;
use core::fmt::Debug;
use embassy_sync::signal::Signal;
use futures::executor::block_on;
use std::path::PathBuf;
use weather_device::clients::mqtt::MqttClient;
use weather_device::domain::led::status::MATRIX_SIZE;
use weather_device::domain::temperature::Celsius;
use weather_device::drivers::led::framebuffer::Framebuffer;
use weather_device::drivers::led::log::LogMatrix;
use weather_device::drivers::sensors::fake::FakeSensor;
use weather_device::traits::led::LedMatrix;
use weather_device::traits::sensors::humidity::HumiditySensor;
use weather_device::traits::sensors::temperature::TemperatureSensor;
use weather_station::config::Config;
use weather_station::{App, AppConfig, ShutdownSignal};

static SHUTDOWN: ShutdownSignal = Signal::new();

/// Publishes averaged Sense HAT readings to an MQTT broker.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(short, long, default_value = "weather-station.toml")]
    config: PathBuf,

    /// Use a simulated sensor and log frames instead of driving the LED matrix.
    #[arg(long)]
    simulate: bool,

    /// Broker host, overriding the configuration file.
    #[arg(long)]
    endpoint: Option<String>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("loading {:?}", args.config))?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint.host = endpoint;
    }
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;
    runtime.spawn(async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Interrupt received");
                SHUTDOWN.signal(());
            }
            Err(e) => log::warn!("Unable to listen for interrupts: {}", e),
        }
    });

    let transport = MqttClient::new(config.mqtt(), runtime.handle().clone());
    let result = if args.simulate {
        log::info!("Simulating sensor and display");
        run(
            config.app(),
            FakeSensor::default().with_jitter(0.5),
            LogMatrix::new(),
            transport,
        )
    } else {
        let sensor = sense_hat::sensor()?;
        let matrix = match &config.display.device {
            Some(path) => Framebuffer::open(path),
            None => Framebuffer::detect(),
        }
        .context("opening the LED matrix")?
        .with_rotation(config.rotation());
        run(config.app(), sensor, matrix, transport)
    };

    runtime.shutdown_timeout(std::time::Duration::from_secs(1));
    result
}

fn run<S, M>(config: AppConfig, sensor: S, matrix: M, transport: MqttClient) -> anyhow::Result<()>
where
    S: TemperatureSensor<Celsius> + HumiditySensor,
    <S as TemperatureSensor<Celsius>>::Error: Debug,
    <S as HumiditySensor>::Error: Debug,
    M: LedMatrix<MATRIX_SIZE>,
    M::Error: Debug,
{
    let mut app = App::new(config, sensor, matrix, transport)?;
    block_on(app.run(&SHUTDOWN))?;
    Ok(())
}

#[cfg(feature = "sense-hat")]
mod sense_hat {
    use linux_embedded_hal::I2cdev;
    use weather_device::drivers::sensors::hts221::Hts221;

    const I2C_BUS: &str = "/dev/i2c-1";

    pub fn sensor() -> anyhow::Result<Hts221<I2cdev>> {
        let i2c = I2cdev::new(I2C_BUS)?;
        let mut sensor = Hts221::new(i2c);
        sensor
            .initialize()
            .map_err(|e| anyhow::anyhow!("initializing HTS221 on {}: {}", I2C_BUS, e))?;
        log::info!("HTS221 ready on {}", I2C_BUS);
        Ok(sensor)
    }
}

#[cfg(not(feature = "sense-hat"))]
mod sense_hat {
    use weather_device::drivers::sensors::fake::FakeSensor;

    pub fn sensor() -> anyhow::Result<FakeSensor> {
        anyhow::bail!("built without the sense-hat feature, run with --simulate")
    }
}
