use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use katana_models::{ModuleStatusResponse, SystemStatusResponse};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

pub fn print_module_list(modules: &[ModuleStatusResponse]) {
    if modules.is_empty() {
        println!("No modules found.");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["NAME", "CATEGORY", "STATUS", "DESCRIPTION"]);

    for module in modules {
        table.add_row(vec![
            module.name.clone(),
            module.category.to_string(),
            module.status.clone(),
            module.description.clone(),
        ]);
    }

    println!("{table}");
}

pub fn print_system_status(status: &SystemStatusResponse) {
    println!("System status");
    println!("  Locked:        {}", status.locked);
    println!(
        "  Docker:        {}",
        if status.docker.reachable {
            "reachable".to_string()
        } else {
            format!(
                "unreachable ({})",
                status.docker.error.as_deref().unwrap_or("unknown error")
            )
        }
    );
    println!(
        "  Certificates:  {}",
        if status.cert.initialized {
            match status.cert.days_until_expiration {
                Some(days) if days < 0 => format!("expired {} day(s) ago", -days),
                Some(days) => format!("initialized, expires in {days} day(s)"),
                None => "initialized".to_string(),
            }
        } else {
            "not initialized".to_string()
        }
    );
    println!(
        "  DNS:           {}",
        if status.dns.remote_mode {
            "remote mode (wildcard DNS expected)".to_string()
        } else {
            format!("{} managed entries", status.dns.managed_entry_count)
        }
    );
    println!(
        "  Proxy:         {} -> http:{} https:{}, {} route(s)",
        status.proxy.bind_address, status.proxy.http_port, status.proxy.https_port, status.proxy.route_count
    );
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
