//! Plain-text renderings of stored records.

use std::fmt::Write as _;

use tracker_engine::{Combat, Npc, Scalar, Translator};

pub fn npc_line(npc: &Npc, tr: &Translator) -> String {
    let mut line = format!(
        "{}\t{}",
        npc.id.as_deref().unwrap_or("-"),
        npc.name.clone().unwrap_or_else(|| tr.t("unknown"))
    );
    if let Some(class) = npc.class.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(line, " ({class})");
    }
    if let Some(fp) = &npc.fp {
        let _ = write!(line, "\t{} {fp}", tr.t("npc_fp"));
    }
    line
}

pub fn combat_line(combat: &Combat, tr: &Translator) -> String {
    let unknown = tr.t("unknown");
    format!(
        "{}\t{}\t{}\t{}",
        combat.id.as_deref().unwrap_or("-"),
        combat.scenario.as_deref().unwrap_or(&unknown),
        combat.scene.as_deref().unwrap_or(&unknown),
        combat.status.as_deref().unwrap_or(&unknown)
    )
}

fn push_field(out: &mut String, tr: &Translator, key: &str, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        let _ = writeln!(out, "{}: {value}", tr.t(key));
    }
}

fn scalar(value: &Option<Scalar>) -> Option<String> {
    value.as_ref().map(Scalar::to_string)
}

pub fn npc_detail(npc: &Npc, tr: &Translator) -> String {
    let mut out = String::new();
    push_field(
        &mut out,
        tr,
        "npc_name",
        Some(npc.name.clone().unwrap_or_else(|| tr.t("unknown"))),
    );
    push_field(&mut out, tr, "npc_class", npc.class.clone());
    for (key, value) in [
        ("npc_fp", &npc.fp),
        ("npc_init", &npc.init),
        ("npc_perception", &npc.perception),
        ("npc_pv", &npc.pv),
        ("npc_vd", &npc.vd),
        ("npc_ce", &npc.ce),
        ("npc_cc", &npc.cc),
        ("npc_ref", &npc.reflex),
        ("npc_vig", &npc.vig),
        ("npc_vol", &npc.vol),
    ] {
        push_field(&mut out, tr, key, scalar(value));
    }
    push_field(&mut out, tr, "npc_immunities", npc.immunities.clone());
    if !npc.attacks.is_empty() {
        let _ = writeln!(out, "{}:", tr.t("npc_attacks"));
        for attack in &npc.attacks {
            let _ = writeln!(out, "  - {attack}");
        }
    }
    push_field(&mut out, tr, "npc_details", npc.details.clone());
    out
}

pub fn combat_detail(combat: &Combat, tr: &Translator) -> String {
    let mut out = format!("{}\n", tr.t("combat_basic_info"));
    push_field(&mut out, tr, "combat_scenario", combat.scenario.clone());
    push_field(&mut out, tr, "combat_scene", combat.scene.clone());
    push_field(&mut out, tr, "combat_status", combat.status.clone());
    out
}
