#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_net::Stack;
use embassy_time::{Duration as EmbassyDuration, Timer, WithTimeout};
use esp_hal::{
    analog::adc::{Adc, AdcConfig, Attenuation},
    clock::CpuClock,
    delay::Delay,
    gpio::{Input, InputConfig, Io, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    rng::Rng,
    rtc_cntl::reset_reason,
    system::Cpu,
    time::Rate,
    timer::timg::TimerGroup,
};
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use focus_core::{
    clock::{Millis, MonotonicClock, has_elapsed},
    config::{DeviceConfig, DeviceIdentity},
    device::{FocusDevice, SensorInputs},
    render::Screen,
    sensors::AuxReadings,
};
use focus_hal_esp32s3::{
    input::{lid::LidSwitch, mic::Microphone, presence::PresenceLine},
    network::{
        BackendEndpoint, ChannelLink, ConnectivityHandle, LinkChannels, WifiConfig,
        ws::{self, HardwareRng},
    },
    platform::{clock::SystemClock, display::CharacterDisplay},
};
use lcd1602_i2c::Config as LcdConfig;
use log::{LevelFilter, info, warn};
use static_cell::StaticCell;

const LCD_I2C_KHZ: u32 = 100;
const CONTROL_LOOP_INTERVAL_MS: u64 = 10;
const RESTART_LOG_FLUSH_MS: u64 = 200;
const WIFI_RETRY_BACKOFF_MIN_SECS: u64 = 2;
const WIFI_RETRY_BACKOFF_MAX_SECS: u64 = 120;
const NETWORK_POLL_INTERVAL_MS: u64 = 500;
const DHCP_TIMEOUT_SECS: u64 = 15;

const WIFI_SSID: &str = env!(
    "FOCUS_WIFI_SSID",
    "Set FOCUS_WIFI_SSID in your environment before building/flashing."
);
const WIFI_PASSWORD: &str = env!(
    "FOCUS_WIFI_PASSWORD",
    "Set FOCUS_WIFI_PASSWORD in your environment before building/flashing."
);
const WIFI_CONFIG: WifiConfig = WifiConfig::new(WIFI_SSID, WIFI_PASSWORD);

const WS_HOST: &str = match option_env!("FOCUS_WS_HOST") {
    Some(host) => host,
    None => "192.168.0.55",
};
const WS_PORT: u16 = match option_env!("FOCUS_WS_PORT") {
    Some(port) => parse_port(port),
    None => 8_000,
};
const WS_PATH: &str = match option_env!("FOCUS_WS_PATH") {
    Some(path) => path,
    None => "/ws/hardware",
};
const BACKEND: BackendEndpoint = BackendEndpoint::new(WS_HOST, WS_PORT, WS_PATH);

const IDENTITY: DeviceIdentity = DeviceIdentity::new(
    match option_env!("FOCUS_HARDWARE_ID") {
        Some(id) => id,
        None => "ESP32S3_FOCUS_001",
    },
    env!("CARGO_PKG_VERSION"),
    "esp32s3",
    "lid,lcd,radar,mic",
);

static CONNECTIVITY: ConnectivityHandle = ConnectivityHandle::new();
static LINK_CHANNELS: LinkChannels = LinkChannels::new();
static NET_RESOURCES: StaticCell<embassy_net::StackResources<4>> = StaticCell::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Decimal port from the build environment; an invalid value fails the build.
const fn parse_port(text: &str) -> u16 {
    let bytes = text.as_bytes();
    assert!(!bytes.is_empty(), "FOCUS_WS_PORT must not be empty");
    let mut value: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "FOCUS_WS_PORT must be decimal");
        value = value * 10 + (digit - b'0') as u32;
        assert!(value <= u16::MAX as u32, "FOCUS_WS_PORT out of range");
        i += 1;
    }
    value as u16
}

fn wifi_retry_backoff_secs(consecutive_failures: u32) -> u64 {
    // 2, 4, 8, 16, 32, 64, 120, 120, ...
    let shift = consecutive_failures.min(6);
    WIFI_RETRY_BACKOFF_MIN_SECS
        .saturating_mul(1u64 << shift)
        .min(WIFI_RETRY_BACKOFF_MAX_SECS)
}

/// Backs off before the next association attempt. A network request from
/// the control loop cuts the wait short.
async fn wait_before_wifi_retry(
    consecutive_failures: &mut u32,
    connectivity: &'static ConnectivityHandle,
) {
    let delay_secs = wifi_retry_backoff_secs(*consecutive_failures);
    *consecutive_failures = consecutive_failures.saturating_add(1);
    info!(
        "wifi: retrying in {}s consecutive_failures={}",
        delay_secs, *consecutive_failures
    );

    let polls = delay_secs * 1_000 / NETWORK_POLL_INTERVAL_MS;
    for _ in 0..polls {
        if connectivity.network_restart_requested() {
            info!("wifi: retry requested early");
            return;
        }
        Timer::after_millis(NETWORK_POLL_INTERVAL_MS).await;
    }
}

async fn wifi_connection_loop(
    wifi_controller: &mut WifiController<'_>,
    stack: Stack<'_>,
    connectivity: &'static ConnectivityHandle,
) -> ! {
    let mut consecutive_failures = 0u32;

    loop {
        connectivity.mark_associating();

        if !wifi_controller.is_started().unwrap_or(false) {
            if let Err(err) = wifi_controller.start_async().await {
                warn!("wifi: start failed: {:?}", err);
                connectivity.mark_disconnected();
                wait_before_wifi_retry(&mut consecutive_failures, connectivity).await;
                continue;
            }
        }

        if let Err(err) = wifi_controller.connect_async().await {
            warn!("wifi: connect failed: {:?}", err);
            connectivity.mark_disconnected();
            let _ = wifi_controller.disconnect_async().await;
            wait_before_wifi_retry(&mut consecutive_failures, connectivity).await;
            continue;
        }

        match stack
            .wait_config_up()
            .with_timeout(EmbassyDuration::from_secs(DHCP_TIMEOUT_SECS))
            .await
        {
            Ok(()) => {
                connectivity.mark_network_up();
                info!("wifi: connected ssid={} dhcp ready", WIFI_CONFIG.ssid);
            }
            Err(_) => {
                warn!("wifi: dhcp timeout; forcing reconnect");
                connectivity.mark_disconnected();
                let _ = wifi_controller.disconnect_async().await;
                wait_before_wifi_retry(&mut consecutive_failures, connectivity).await;
                continue;
            }
        }

        consecutive_failures = 0;

        loop {
            let link_up = stack.is_link_up();
            let has_ipv4 = stack.config_v4().is_some();
            let is_connected = matches!(wifi_controller.is_connected(), Ok(true));

            if !(link_up && has_ipv4 && is_connected) {
                info!(
                    "wifi: state lost link_up={} has_ipv4={} connected={}; reconnecting",
                    link_up, has_ipv4, is_connected
                );
                break;
            }

            if let Ok(rssi) = wifi_controller.rssi() {
                connectivity.update_rssi(rssi.clamp(i8::MIN as i32 + 1, 0) as i8);
            }

            Timer::after_millis(NETWORK_POLL_INTERVAL_MS).await;
        }

        connectivity.mark_disconnected();
        let _ = wifi_controller.disconnect_async().await;
        wait_before_wifi_retry(&mut consecutive_failures, connectivity).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: focus-enforcer starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    info!("boot: reset_reason={:?}", reset_reason(Cpu::ProCpu));

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let clock = SystemClock;
    let mut delay = Delay::new();

    // LCD1602 backpack: SDA=GPIO8, SCL=GPIO9
    let i2c = match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(LCD_I2C_KHZ)),
    ) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO8).with_scl(peripherals.GPIO9),
        Err(err) => {
            info!("display: i2c config failed: {:?}", err);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };
    let mut display = CharacterDisplay::new(i2c, LcdConfig::default());
    let display_ready = match display.initialize(&mut delay) {
        Ok(()) => {
            display.render(&Screen::Booting);
            esp_println::println!("display: initialize ok");
            true
        }
        Err(err) => {
            esp_println::println!("display: initialize failed");
            warn!("display: initialize failed: {:?}", err);
            false
        }
    };

    // Lid sensor: OUT=GPIO4 (pulled up, high = open)
    let mut io = Io::new(peripherals.IO_MUX);
    let lid = LidSwitch::install(&mut io, peripherals.GPIO4);

    // LD2410 radar: OUT=GPIO5
    let mut presence = PresenceLine::new(Input::new(
        peripherals.GPIO5,
        InputConfig::default().with_pull(Pull::Down),
    ));

    // Sound sensor: AO=GPIO1 (ADC1 channel 0)
    let mut adc_config = AdcConfig::new();
    let mic_pin = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let mut microphone = Microphone::new(Adc::new(peripherals.ADC1, adc_config), mic_pin);

    let rng = Rng::new();
    let net_seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            info!("esp-radio init failed: {:?}", err);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                info!("wifi peripheral init failed: {:?}", err);
                loop {
                    Timer::after_secs(1).await;
                }
            }
        };

    let client_config = ClientConfig::default()
        .with_ssid(WIFI_CONFIG.ssid.into())
        .with_password(WIFI_CONFIG.password.into());
    let wifi_mode = ModeConfig::Client(client_config);
    if let Err(err) = wifi_controller.set_config(&wifi_mode) {
        info!("wifi mode config failed: {:?}", err);
        loop {
            Timer::after_secs(1).await;
        }
    }

    let stack_config = embassy_net::Config::dhcpv4(Default::default());
    let (stack, mut net_runner) = embassy_net::new(
        interfaces.sta,
        stack_config,
        NET_RESOURCES.init(embassy_net::StackResources::<4>::new()),
        net_seed,
    );

    let device_config = DeviceConfig::default();
    let mut device = FocusDevice::new(
        device_config,
        IDENTITY,
        lid.edges(),
        ChannelLink::new(&CONNECTIVITY, &LINK_CHANNELS),
        clock.now_ms(),
        lid.is_open(),
    );
    if !display_ready {
        warn!("display: unavailable; running without screen output");
    }

    info!(
        "boot: device ready id={} backend={}:{}{}",
        IDENTITY.hardware_id, BACKEND.host, BACKEND.port, BACKEND.path
    );
    info!("boot: pins lid=GPIO4 radar=GPIO5 mic=GPIO1 lcd_sda=GPIO8 lcd_scl=GPIO9");

    CONNECTIVITY.mark_associating();

    let net_future = net_runner.run();
    let wifi_future = wifi_connection_loop(&mut wifi_controller, stack, &CONNECTIVITY);
    let ws_future = ws::session_loop(
        stack,
        &CONNECTIVITY,
        &LINK_CHANNELS,
        BACKEND,
        HardwareRng::new(rng),
    );
    let control_future = async {
        let mut inputs = SensorInputs::default();
        let mut mic_read_at: Option<Millis> = None;
        loop {
            let now: Millis = clock.now_ms();
            inputs.lid_open_raw = lid.is_open();
            inputs.presence_raw = presence.read();
            // The ADC is only sampled at telemetry cadence.
            if mic_read_at
                .is_none_or(|at| has_elapsed(now, at, device_config.sensor_interval_ms))
            {
                inputs.aux = AuxReadings {
                    mic_db: microphone.read_db(),
                    nfc_id: None,
                };
                mic_read_at = Some(now);
            }
            inputs.free_memory = esp_alloc::HEAP.free() as u32;

            let outcome = device.tick(now, &inputs);

            if outcome.restart_requested {
                warn!("control: link unrecoverable; restarting");
                Timer::after_millis(RESTART_LOG_FLUSH_MS).await;
                esp_hal::system::software_reset();
            }

            if outcome.render_requested && display_ready {
                display.render(&device.screen(now));
            }

            Timer::after_millis(CONTROL_LOOP_INTERVAL_MS).await;
        }
    };

    let _ = embassy_futures::join::join4(net_future, wifi_future, ws_future, control_future).await;
    unreachable!()
}
