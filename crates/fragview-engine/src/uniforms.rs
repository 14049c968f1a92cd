//! Uniform function registry.
//!
//! A registered uniform pairs "how the value gets into the active program"
//! with "how the value prints on the console", plus a liveness flag that is
//! recomputed on every reload. Built-ins carry a [`Builtin`] tag naming the
//! live value they read; user-defined uniforms carry the floats typed on the
//! console. The render thread maps both onto GL calls; this module never
//! touches GL.

use std::collections::BTreeMap;

/// A value a console line can assign: scalar through vec4.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl UniformValue {
    /// Build a value from parsed floats; arity picks the vector size.
    pub fn from_floats(values: &[f32]) -> Option<Self> {
        match values {
            [x] => Some(UniformValue::Float(*x)),
            [x, y] => Some(UniformValue::Vec2([*x, *y])),
            [x, y, z] => Some(UniformValue::Vec3([*x, *y, *z])),
            [x, y, z, w] => Some(UniformValue::Vec4([*x, *y, *z, *w])),
            _ => None,
        }
    }

    pub fn components(&self) -> &[f32] {
        match self {
            UniformValue::Float(v) => std::slice::from_ref(v),
            UniformValue::Vec2(v) => v,
            UniformValue::Vec3(v) => v,
            UniformValue::Vec4(v) => v,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
            UniformValue::Vec3(_) => "vec3",
            UniformValue::Vec4(_) => "vec4",
        }
    }

    pub fn dump(&self) -> String {
        let parts: Vec<String> = self.components().iter().map(|v| v.to_string()).collect();
        parts.join(",")
    }
}

/// Live value sources for the built-in uniforms. The render thread resolves
/// each tag against its clock, input state, and framebuffers every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Time,
    Delta,
    Date,
    Mouse,
    Resolution,
    SceneTexture,
    SceneDepth,
    LightShadowMap,
    View2d,
    ModelViewProjection,
}

/// Per-frame snapshot of live values. The render thread refreshes one of
/// these under a mutex so the console thread can answer query commands and
/// uniform dumps with whatever the last rendered frame saw.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSample {
    pub time: f32,
    pub delta: f32,
    pub fps: f32,
    pub frame: u64,
    pub date: [f32; 4],
    pub mouse: [f32; 2],
    pub resolution: [f32; 2],
    pub pixel_density: f32,
}

impl Builtin {
    /// Console rendering of the current value, for sources that have a
    /// printable one. Texture and matrix sources dump nothing.
    pub fn text_value(self, s: &FrameSample) -> Option<String> {
        match self {
            Builtin::Time => Some(s.time.to_string()),
            Builtin::Delta => Some(s.delta.to_string()),
            Builtin::Date => Some(format!("{},{},{},{}", s.date[0], s.date[1], s.date[2], s.date[3])),
            Builtin::Mouse => Some(format!("{},{}", s.mouse[0], s.mouse[1])),
            Builtin::Resolution => Some(format!("{},{}", s.resolution[0], s.resolution[1])),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct UniformFunction {
    pub decl_type: &'static str,
    pub builtin: Builtin,
    /// Whether the name occurs in the currently compiled source. Gates both
    /// per-frame binding and debug views of the backing resource.
    pub present: bool,
}

#[derive(Debug, Clone)]
pub struct DataUniform {
    pub value: UniformValue,
    pub changed: bool,
}

/// Registry of built-in uniform functions and user-defined data uniforms.
#[derive(Debug, Default)]
pub struct UniformRegistry {
    functions: BTreeMap<&'static str, UniformFunction>,
    data: BTreeMap<String, DataUniform>,
    changed: bool,
}

impl UniformRegistry {
    pub fn new() -> Self {
        let mut reg = Self::default();
        reg.register("u_time", "float", Builtin::Time);
        reg.register("u_delta", "float", Builtin::Delta);
        reg.register("u_date", "vec4", Builtin::Date);
        reg.register("u_mouse", "vec2", Builtin::Mouse);
        reg.register("u_resolution", "vec2", Builtin::Resolution);
        reg.register("u_scene", "sampler2D", Builtin::SceneTexture);
        reg.register("u_sceneDepth", "sampler2D", Builtin::SceneDepth);
        reg.register("u_lightShadowMap", "sampler2D", Builtin::LightShadowMap);
        reg.register("u_view2d", "mat3", Builtin::View2d);
        reg.register("u_modelViewProjectionMatrix", "mat4", Builtin::ModelViewProjection);
        reg
    }

    fn register(&mut self, name: &'static str, decl_type: &'static str, builtin: Builtin) {
        self.functions.insert(name, UniformFunction { decl_type, builtin, present: false });
    }

    pub fn functions(&self) -> impl Iterator<Item = (&'static str, &UniformFunction)> {
        self.functions.iter().map(|(k, v)| (*k, v))
    }

    pub fn data(&self) -> impl Iterator<Item = (&str, &DataUniform)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.functions.get(name).map(|f| f.present).unwrap_or(false)
    }

    /// Force a built-in live regardless of the source scan (the fallback
    /// anti-aliasing filter samples `u_scene` without the user source ever
    /// naming it).
    pub fn force_present(&mut self, name: &str) {
        if let Some(f) = self.functions.get_mut(name) {
            f.present = true;
        }
    }

    /// Recompute every built-in's liveness against freshly compiled sources.
    ///
    /// This is a plain substring scan, not symbol resolution: a name that
    /// only appears in a comment still counts as present. Conservative and
    /// cheap beats a preprocessor here; the worst case is a needless bind.
    pub fn check_presence(&mut self, vert_source: &str, frag_source: &str) {
        for (name, f) in self.functions.iter_mut() {
            f.present = vert_source.contains(name) || frag_source.contains(name);
        }
    }

    /// Parse a console assignment line `name,v1[,v2,v3,v4]`, creating the
    /// data uniform when it does not exist and inferring arity from the
    /// number of numeric tokens. Returns false for anything unparseable
    /// (the console silently ignores such lines).
    pub fn parse_line(&mut self, line: &str) -> bool {
        let mut parts = line.split(',');
        let name = match parts.next() {
            Some(n) if !n.is_empty() => n,
            _ => return false,
        };
        let mut values = Vec::new();
        for tok in parts {
            match tok.trim().parse::<f32>() {
                Ok(v) => values.push(v),
                Err(_) => return false,
            }
        }
        let value = match UniformValue::from_floats(&values) {
            Some(v) => v,
            None => return false,
        };
        self.data.insert(name.to_string(), DataUniform { value, changed: true });
        self.changed = true;
        true
    }

    pub fn value_of(&self, name: &str) -> Option<&UniformValue> {
        self.data.get(name).map(|d| &d.value)
    }

    /// Console listing for the `uniforms` command: data uniforms always,
    /// built-ins when present (or all of them when `all` is set).
    pub fn dump(&self, sample: &FrameSample, all: bool) -> Vec<String> {
        let mut out = Vec::new();
        for (name, d) in &self.data {
            out.push(format!("{},{}", name, d.value.dump()));
        }
        for (name, f) in &self.functions {
            if !all && !f.present {
                continue;
            }
            match f.builtin.text_value(sample) {
                Some(v) => out.push(format!("{},{}", name, v)),
                None => out.push(format!("{},{}", name, f.decl_type)),
            }
        }
        out
    }

    pub fn have_change(&self) -> bool {
        self.changed
    }

    pub fn unflag_change(&mut self) {
        self.changed = false;
        for d in self.data.values_mut() {
            d.changed = false;
        }
    }

    /// Flag every data uniform changed so the next frame re-uploads all of
    /// them (the `update` command).
    pub fn flag_all_changed(&mut self) {
        for d in self.data.values_mut() {
            d.changed = true;
        }
        self.changed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_line_infers_arity() {
        let mut reg = UniformRegistry::new();
        assert!(reg.parse_line("u_speed,0.5"));
        assert!(reg.parse_line("u_size,640,480"));
        assert!(reg.parse_line("u_color,1,0,0"));
        assert!(reg.parse_line("u_rect,0,0,1,1"));

        assert_eq!(reg.value_of("u_speed"), Some(&UniformValue::Float(0.5)));
        assert_eq!(reg.value_of("u_color"), Some(&UniformValue::Vec3([1.0, 0.0, 0.0])));
        assert_eq!(reg.value_of("u_rect").unwrap().type_name(), "vec4");
    }

    #[test]
    fn parse_line_rejects_garbage() {
        let mut reg = UniformRegistry::new();
        assert!(!reg.parse_line(""));
        assert!(!reg.parse_line("u_color,red"));
        assert!(!reg.parse_line("u_big,1,2,3,4,5"));
        assert!(!reg.parse_line("u_lonely"));
        assert!(!reg.have_change());
    }

    #[test]
    fn assignment_round_trips_through_dump() {
        let mut reg = UniformRegistry::new();
        assert!(reg.parse_line("u_test,1.5,2.5,3.5"));
        let lines = reg.dump(&FrameSample::default(), false);
        assert!(lines.contains(&"u_test,1.5,2.5,3.5".to_string()));
    }

    #[test]
    fn presence_is_a_substring_scan() {
        let mut reg = UniformRegistry::new();
        reg.check_presence(
            "void main() { gl_Position = vec4(0.0); }",
            "uniform float u_time;\n// u_mouse someday\nvoid main() {}",
        );
        assert!(reg.is_present("u_time"));
        // A commented-out mention still counts; the scan is deliberately
        // textual.
        assert!(reg.is_present("u_mouse"));
        assert!(!reg.is_present("u_scene"));

        reg.force_present("u_scene");
        assert!(reg.is_present("u_scene"));
    }

    #[test]
    fn update_flags_everything_changed() {
        let mut reg = UniformRegistry::new();
        reg.parse_line("u_a,1");
        reg.unflag_change();
        assert!(!reg.have_change());
        reg.flag_all_changed();
        assert!(reg.have_change());
        assert!(reg.data().all(|(_, d)| d.changed));
    }
}
