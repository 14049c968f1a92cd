//! Texture and environment-map loading.
//!
//! Decoding goes through the `image` crate; uploads stay on the render
//! thread. Watched image entries reload in place, so samplers bound by name
//! keep pointing at fresh pixels after an edit.

use std::path::{Path, PathBuf};

use glow::HasContext;

pub struct Texture {
    tex: glow::NativeTexture,
    pub path: PathBuf,
    pub width: i32,
    pub height: i32,
    pub v_flip: bool,
}

impl Texture {
    pub fn load(gl: &glow::Context, path: &Path, v_flip: bool) -> anyhow::Result<Self> {
        let (tex, w, h) = upload_rgba8(gl, path, v_flip, None)?;
        Ok(Self { tex, path: path.to_path_buf(), width: w, height: h, v_flip })
    }

    /// Re-decode the file into the existing GL texture.
    pub fn reload(&mut self, gl: &glow::Context) -> anyhow::Result<()> {
        let (_, w, h) = upload_rgba8(gl, &self.path, self.v_flip, Some(self.tex))?;
        self.width = w;
        self.height = h;
        Ok(())
    }

    /// 256x1 float texture holding histogram bin frequencies.
    pub fn from_rgba32f(gl: &glow::Context, w: i32, h: i32, data: &[f32]) -> Self {
        unsafe {
            let tex = gl.create_texture().expect("create_texture failed");
            gl.bind_texture(glow::TEXTURE_2D, Some(tex));
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA32F as i32,
                w,
                h,
                0,
                glow::RGBA,
                glow::FLOAT,
                glow::PixelUnpackData::Slice(Some(f32_bytes(data))),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
            Self { tex, path: PathBuf::new(), width: w, height: h, v_flip: false }
        }
    }

    pub fn update_rgba32f(&mut self, gl: &glow::Context, data: &[f32]) {
        unsafe {
            gl.bind_texture(glow::TEXTURE_2D, Some(self.tex));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                self.width,
                self.height,
                glow::RGBA,
                glow::FLOAT,
                glow::PixelUnpackData::Slice(Some(f32_bytes(data))),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }
    }

    pub fn id(&self) -> glow::NativeTexture {
        self.tex
    }

    pub fn delete(&self, gl: &glow::Context) {
        unsafe { gl.delete_texture(self.tex) };
    }
}

fn f32_bytes(data: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(data.as_ptr() as *const u8, data.len() * 4) }
}

fn upload_rgba8(
    gl: &glow::Context,
    path: &Path,
    v_flip: bool,
    into: Option<glow::NativeTexture>,
) -> anyhow::Result<(glow::NativeTexture, i32, i32)> {
    let img = image::open(path)?;
    let img = if v_flip { img.flipv() } else { img };
    let rgba = img.to_rgba8();
    let (w, h) = (rgba.width() as i32, rgba.height() as i32);

    unsafe {
        let tex = match into {
            Some(t) => t,
            None => gl.create_texture().map_err(|e| anyhow::anyhow!("create_texture: {e}"))?,
        };
        gl.bind_texture(glow::TEXTURE_2D, Some(tex));
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA as i32,
            w,
            h,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(Some(rgba.as_raw().as_slice())),
        );
        gl.bind_texture(glow::TEXTURE_2D, None);
        Ok((tex, w, h))
    }
}

/// Cubemap built from an equirectangular environment map. Face directions
/// follow the GL cube-map convention; sampling is nearest-texel, which is
/// plenty for preview lighting.
pub struct CubeMap {
    tex: glow::NativeTexture,
    pub path: PathBuf,
    pub v_flip: bool,
}

impl CubeMap {
    pub fn load(gl: &glow::Context, path: &Path, v_flip: bool) -> anyhow::Result<Self> {
        let tex = unsafe { gl.create_texture().map_err(|e| anyhow::anyhow!("create_texture: {e}"))? };
        let cm = Self { tex, path: path.to_path_buf(), v_flip };
        cm.upload(gl)?;
        Ok(cm)
    }

    pub fn reload(&self, gl: &glow::Context) -> anyhow::Result<()> {
        self.upload(gl)
    }

    fn upload(&self, gl: &glow::Context) -> anyhow::Result<()> {
        let img = image::open(&self.path)?;
        let img = if self.v_flip { img.flipv() } else { img };
        let rgb = img.to_rgb32f();
        let (ew, eh) = (rgb.width() as i32, rgb.height() as i32);
        let face = (eh / 2).clamp(16, 512);

        unsafe {
            gl.bind_texture(glow::TEXTURE_CUBE_MAP, Some(self.tex));
            for (p, v) in [
                (glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32),
                (glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32),
                (glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32),
                (glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32),
                (glow::TEXTURE_WRAP_R, glow::CLAMP_TO_EDGE as i32),
            ] {
                gl.tex_parameter_i32(glow::TEXTURE_CUBE_MAP, p, v);
            }

            let mut pixels = vec![0f32; (face * face * 3) as usize];
            for f in 0..6u32 {
                for y in 0..face {
                    for x in 0..face {
                        let a = 2.0 * (x as f32 + 0.5) / face as f32 - 1.0;
                        let b = 2.0 * (y as f32 + 0.5) / face as f32 - 1.0;
                        let d = face_direction(f, a, b);

                        let lon = d[2].atan2(d[0]);
                        let lat = (d[1] / (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()).asin();
                        let u = lon / (2.0 * std::f32::consts::PI) + 0.5;
                        let v = 0.5 - lat / std::f32::consts::PI;

                        let sx = ((u * ew as f32) as i32).clamp(0, ew - 1);
                        let sy = ((v * eh as f32) as i32).clamp(0, eh - 1);
                        let src = rgb.get_pixel(sx as u32, sy as u32);
                        let dst = ((y * face + x) * 3) as usize;
                        pixels[dst] = src[0];
                        pixels[dst + 1] = src[1];
                        pixels[dst + 2] = src[2];
                    }
                }
                gl.tex_image_2d(
                    glow::TEXTURE_CUBE_MAP_POSITIVE_X + f,
                    0,
                    glow::RGB32F as i32,
                    face,
                    face,
                    0,
                    glow::RGB,
                    glow::FLOAT,
                    glow::PixelUnpackData::Slice(Some(f32_bytes(&pixels))),
                );
            }
            gl.bind_texture(glow::TEXTURE_CUBE_MAP, None);
        }
        Ok(())
    }

    pub fn id(&self) -> glow::NativeTexture {
        self.tex
    }

    pub fn delete(&self, gl: &glow::Context) {
        unsafe { gl.delete_texture(self.tex) };
    }
}

fn face_direction(face: u32, a: f32, b: f32) -> [f32; 3] {
    match face {
        0 => [1.0, -b, -a],  // +X
        1 => [-1.0, -b, a],  // -X
        2 => [a, 1.0, b],    // +Y
        3 => [a, -1.0, -b],  // -Y
        4 => [a, -b, 1.0],   // +Z
        _ => [-a, -b, -1.0], // -Z
    }
}
