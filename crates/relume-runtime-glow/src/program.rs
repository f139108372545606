use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use glow::HasContext;

use relume_core::{EngineError, ShaderStage, StageDiagnostic};
use relume_source::ResolvedSource;

/// A linked program plus the flattened sources it was built from.
///
/// The old program of a layer is destroyed only after a replacement built
/// successfully, so a broken edit never takes a working layer down.
pub struct CompiledProgram {
    pub program: glow::NativeProgram,
    /// Per-stage flattened sources in compile order.
    pub sources: Vec<(ShaderStage, ResolvedSource)>,
    /// Union of every file that contributed to any stage.
    pub deps: BTreeSet<PathBuf>,
}

impl CompiledProgram {
    pub fn source_for(&self, stage: ShaderStage) -> Option<&ResolvedSource> {
        self.sources
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, src)| src)
    }

    pub unsafe fn destroy(&mut self, gl: &glow::Context) {
        gl.delete_program(self.program);
    }
}

fn stage_gl(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => glow::VERTEX_SHADER,
        ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        ShaderStage::Geometry => glow::GEOMETRY_SHADER,
        ShaderStage::Compute => glow::COMPUTE_SHADER,
    }
}

/// Compile and link every stage of one layer.
///
/// All stages are compiled before bailing so one edit pass surfaces every
/// broken stage at once, not just the first.
pub unsafe fn build_program(
    gl: &glow::Context,
    sources: Vec<(ShaderStage, ResolvedSource)>,
) -> Result<CompiledProgram, EngineError> {
    let mut shaders = Vec::with_capacity(sources.len());
    let mut diagnostics = Vec::new();

    for (stage, src) in &sources {
        match compile_stage(gl, *stage, &src.text) {
            Ok(sh) => shaders.push(sh),
            Err(log) => diagnostics.push(StageDiagnostic {
                stage: *stage,
                log: humanize_log(&log, &src.files),
            }),
        }
    }
    if !diagnostics.is_empty() {
        for sh in shaders {
            gl.delete_shader(sh);
        }
        return Err(EngineError::StageCompile { diagnostics });
    }

    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            for sh in shaders {
                gl.delete_shader(sh);
            }
            return Err(EngineError::GlCreate(format!(
                "create_program failed: {e:?}"
            )));
        }
    };
    for sh in &shaders {
        gl.attach_shader(program, *sh);
    }
    gl.link_program(program);
    let linked = gl.get_program_link_status(program);
    let log = gl.get_program_info_log(program);
    for sh in shaders {
        gl.detach_shader(program, sh);
        gl.delete_shader(sh);
    }
    if !linked {
        gl.delete_program(program);
        let files = sources
            .iter()
            .flat_map(|(_, src)| src.files.iter().cloned())
            .collect::<Vec<_>>();
        return Err(EngineError::Link(humanize_log(&log, &files)));
    }

    let deps = sources
        .iter()
        .flat_map(|(_, src)| src.deps.iter().cloned())
        .collect();

    Ok(CompiledProgram {
        program,
        sources,
        deps,
    })
}

/// Compile and link a runtime-internal raster program (the blit pass).
/// These sources ship with the crate, so failures are creation errors,
/// not author diagnostics.
pub(crate) unsafe fn build_internal(
    gl: &glow::Context,
    vert: &str,
    frag: &str,
) -> Result<glow::NativeProgram, EngineError> {
    let vs = compile_stage(gl, ShaderStage::Vertex, vert).map_err(EngineError::GlCreate)?;
    let fs = match compile_stage(gl, ShaderStage::Fragment, frag) {
        Ok(f) => f,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(EngineError::GlCreate(e));
        }
    };
    let program = match gl.create_program() {
        Ok(p) => p,
        Err(e) => {
            gl.delete_shader(vs);
            gl.delete_shader(fs);
            return Err(EngineError::GlCreate(format!(
                "create_program failed: {e:?}"
            )));
        }
    };
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);
    let linked = gl.get_program_link_status(program);
    let log = gl.get_program_info_log(program);
    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);
    if !linked {
        gl.delete_program(program);
        return Err(EngineError::GlCreate(format!("internal link failed: {log}")));
    }
    Ok(program)
}

unsafe fn compile_stage(
    gl: &glow::Context,
    stage: ShaderStage,
    text: &str,
) -> Result<glow::NativeShader, String> {
    let shader = gl
        .create_shader(stage_gl(stage))
        .map_err(|e| format!("create_shader failed: {e:?}"))?;
    gl.shader_source(shader, text);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(log);
    }
    Ok(shader)
}

// -------------------------------------------------------------------------------------------------
// Driver log rewriting
// -------------------------------------------------------------------------------------------------

/// Substitute `#line` source-string numbers in a driver log with the file
/// names they stand for. Handles the two common shapes, Mesa/ANGLE
/// `N:LINE:` and NVIDIA `N(LINE)`; anything else passes through untouched.
pub(crate) fn humanize_log(log: &str, files: &[PathBuf]) -> String {
    log.lines()
        .map(|line| rewrite_line(line, files))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rewrite_line(line: &str, files: &[PathBuf]) -> String {
    if let Some(out) = rewrite_paren_form(line, files) {
        return out;
    }
    if let Some(out) = rewrite_colon_form(line, files) {
        return out;
    }
    line.to_string()
}

fn leading_number(s: &str) -> Option<(usize, &str)> {
    let end = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    s[..end].parse().ok().map(|n| (n, &s[end..]))
}

fn file_name(files: &[PathBuf], index: usize) -> Option<&Path> {
    files.get(index).map(PathBuf::as_path)
}

/// `N(LINE)` at the start of the line.
fn rewrite_paren_form(line: &str, files: &[PathBuf]) -> Option<String> {
    let (index, rest) = leading_number(line)?;
    let rest = rest.strip_prefix('(')?;
    let (lineno, rest) = leading_number(rest)?;
    let rest = rest.strip_prefix(')')?;
    let file = file_name(files, index)?;
    Some(format!("{}:{}{}", file.display(), lineno, rest))
}

/// First `N:LINE:` on the line whose leading digit does not continue an
/// identifier (so `error C1008:` is left alone).
fn rewrite_colon_form(line: &str, files: &[PathBuf]) -> Option<String> {
    for (at, c) in line.char_indices() {
        if !c.is_ascii_digit() {
            continue;
        }
        let boundary = line[..at]
            .chars()
            .next_back()
            .map_or(true, |p| !p.is_ascii_alphanumeric() && p != '.');
        if !boundary {
            continue;
        }
        let tail = &line[at..];
        let Some((index, rest)) = leading_number(tail) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let Some((lineno, rest)) = leading_number(rest) else {
            continue;
        };
        let Some(rest) = rest.strip_prefix(':') else {
            continue;
        };
        let file = file_name(files, index)?;
        return Some(format!(
            "{}{}:{}:{}",
            &line[..at],
            file.display(),
            lineno,
            rest
        ));
    }
    None
}
