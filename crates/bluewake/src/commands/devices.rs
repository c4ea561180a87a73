//! Device command handlers: listing, discovery, connect and disconnect.

use tabled::Tabled;

use bluewake_core::Device;

use crate::cli::{DeviceTarget, DevicesArgs, OutputFormat, ScanArgs};
use crate::error::CliError;
use crate::host::TerminalSink;
use crate::output;

use super::util::{self, Spinner};
use super::{Output, Session};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Paired")]
    paired: String,
    #[tabled(rename = "Connected")]
    connected: String,
    #[tabled(rename = "RSSI")]
    rssi: String,
}

fn yes_no(flag: bool) -> String {
    if flag { "yes".into() } else { String::new() }
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            address: d.address.to_string(),
            name: d.name.clone().unwrap_or_default(),
            paired: yes_no(d.paired),
            connected: yes_no(d.connected),
            rssi: d.rssi.map(|r| format!("{r} dBm")).unwrap_or_default(),
        }
    }
}

fn detail(d: &Device) -> String {
    output::detail_lines(&[
        ("Address:", d.address.to_string()),
        ("Name:", d.name.clone().unwrap_or_else(|| "-".into())),
        ("Paired:", d.paired.to_string()),
        ("Trusted:", d.trusted.to_string()),
        ("Connected:", d.connected.to_string()),
    ])
}

fn print_devices(devices: &[Device], out: &Output) {
    let rendered = output::render_list(
        out.format,
        devices,
        |d| DeviceRow::from(d),
        |d| d.address.to_string(),
    );
    output::print_output(&rendered, out.quiet);
}

async fn require_radio(session: &Session) -> Result<(), CliError> {
    if session.app.adapter().is_enabled().await {
        Ok(())
    } else {
        Err(CliError::RadioOff)
    }
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(session: &Session, args: DevicesArgs, out: &Output) -> Result<(), CliError> {
    let directory = session.app.directory();
    let devices = if args.paired {
        directory.paired().await?
    } else {
        directory.list().await?
    };
    print_devices(&devices, out);
    Ok(())
}

pub async fn scan(
    session: &Session,
    args: ScanArgs,
    ui: &TerminalSink,
    out: &Output,
) -> Result<(), CliError> {
    require_radio(session).await?;
    let devices = {
        let _spinner = Spinner::start(
            ui,
            format!("Scanning for {}", util::human(args.duration)),
            out.quiet,
        );
        session.app.scan(args.duration).await?
    };
    print_devices(&devices, out);
    Ok(())
}

pub async fn connect(
    session: &Session,
    args: DeviceTarget,
    ui: &TerminalSink,
    out: &Output,
) -> Result<(), CliError> {
    require_radio(session).await?;
    let candidates = if args.address.is_some() {
        Vec::new()
    } else {
        session.app.directory().paired().await?
    };
    let address = util::resolve_address(
        ui,
        args.address.as_deref(),
        &candidates,
        "Connect which device?",
    )?;

    let device = {
        let _spinner = Spinner::start(ui, format!("Connecting to {address}"), out.quiet);
        session.app.connect(&address).await?
    };

    // The notification already said so on a terminal.
    if out.format != OutputFormat::Table {
        let rendered = output::render_single(out.format, &device, detail, |d| {
            d.address.to_string()
        });
        output::print_output(&rendered, out.quiet);
    }
    Ok(())
}

pub async fn disconnect(
    session: &Session,
    args: DeviceTarget,
    ui: &TerminalSink,
) -> Result<(), CliError> {
    let candidates: Vec<Device> = if args.address.is_some() {
        Vec::new()
    } else {
        session
            .app
            .directory()
            .list()
            .await?
            .into_iter()
            .filter(|d| d.connected)
            .collect()
    };
    let address = util::resolve_address(
        ui,
        args.address.as_deref(),
        &candidates,
        "Disconnect which device?",
    )?;
    session.app.disconnect(&address).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bluewake_api::ObjectPath;
    use bluewake_core::MacAddress;

    use super::*;

    fn gamepad() -> Device {
        Device {
            address: MacAddress::parse("e4:17:d8:2a:90:11").unwrap(),
            name: Some("8BitDo Micro gamepad".into()),
            paired: true,
            trusted: true,
            connected: false,
            rssi: Some(-61),
            path: ObjectPath::new("/org/bluez/hci0/dev_E4_17_D8_2A_90_11"),
        }
    }

    #[test]
    fn row_marks_flags_and_signal() {
        let row = DeviceRow::from(&gamepad());
        assert_eq!(row.address, "E4:17:D8:2A:90:11");
        assert_eq!(row.paired, "yes");
        assert_eq!(row.connected, "");
        assert_eq!(row.rssi, "-61 dBm");
    }

    #[test]
    fn detail_lists_address_first() {
        let text = detail(&gamepad());
        assert!(text.starts_with("Address:    E4:17:D8:2A:90:11"), "{text}");
    }
}
