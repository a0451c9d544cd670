//! The `J[...]` expression round-trip grammar (§6, §10 ambient expansion).
//!
//! `J[R|P,A[θ]|RP,A[θ] [,color[name]], P[x,y], L[a,b,…]]`, with numeric
//! trailing zeros stripped. This is *not* a general mechanism-description
//! parser (out of scope, §1) — just the round-trip for a single joint.
use crate::error::KinematicError;
use crate::joint::{JointType, VPoint};

fn top_level_parts(body: &str) -> Vec<&str> {
    let mut depth = 0i32;
    let mut start = 0usize;
    let mut parts = Vec::new();
    for (i, ch) in body.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn bracket_contents<'a>(s: &'a str, tag: &str) -> Option<&'a str> {
    let s = s.trim();
    let prefix = format!("{tag}[");
    s.strip_prefix(&prefix)?.strip_suffix(']')
}

pub(crate) fn vpoint_to_expr(vp: &VPoint) -> String {
    let mut parts = vec![vp.ty.to_string()];
    if vp.ty != JointType::R {
        parts.push(format!("A[{}]", vp.angle()));
    }
    if let Some(color) = &vp.color {
        parts.push(format!("color[{color}]"));
    }
    parts.push(format!("P[{},{}]", vp.x, vp.y));
    parts.push(format!("L[{}]", vp.links.join(",")));
    format!("J[{}]", parts.join(","))
}

pub(crate) fn vpoint_from_expr(s: &str) -> Result<VPoint, KinematicError> {
    let err = |msg: &str| KinematicError::MalformedJoint(format!("{msg} in {s:?}"));
    let body = s
        .trim()
        .strip_prefix("J[")
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| err("expected J[...] wrapper"))?;
    let parts = top_level_parts(body);
    let mut idx = 0usize;
    let ty = match parts.first().map(|s| s.trim()) {
        Some("R") => JointType::R,
        Some("P") => JointType::P,
        Some("RP") => JointType::RP,
        _ => return Err(err("expected R, P or RP")),
    };
    idx += 1;
    let mut angle = 0.;
    if ty != JointType::R {
        let raw = parts.get(idx).ok_or_else(|| err("missing angle field"))?;
        let deg = bracket_contents(raw, "A").ok_or_else(|| err("expected A[angle]"))?;
        angle = deg.trim().parse::<f64>().map_err(|_| err("bad angle number"))?;
        idx += 1;
    }
    let mut color = None;
    if let Some(raw) = parts.get(idx) {
        if let Some(name) = bracket_contents(raw, "color") {
            color = Some(name.to_string());
            idx += 1;
        }
    }
    let p_raw = parts.get(idx).ok_or_else(|| err("missing P[...] field"))?;
    let p_body = bracket_contents(p_raw, "P").ok_or_else(|| err("expected P[x,y]"))?;
    idx += 1;
    let xy = top_level_parts(p_body);
    if xy.len() != 2 {
        return Err(err("P[...] needs exactly two components"));
    }
    let x = xy[0].trim().parse::<f64>().map_err(|_| err("bad x"))?;
    let y = xy[1].trim().parse::<f64>().map_err(|_| err("bad y"))?;
    let l_raw = parts.get(idx).ok_or_else(|| err("missing L[...] field"))?;
    let l_body = bracket_contents(l_raw, "L").ok_or_else(|| err("expected L[...]"))?;
    let links = l_body.to_string();

    let mut vp = match ty {
        JointType::R => VPoint::r_joint(&links, x, y),
        JointType::P | JointType::RP => VPoint::slider_joint(&links, ty, angle, x, y)?,
    };
    vp.color = color;
    Ok(vp)
}
