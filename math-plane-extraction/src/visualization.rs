//! Display of point, line and mesh geometries

use crate::error::{ExtractionError, Result};
use crate::types::{Point, Rgb};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A renderable primitive. `color: None` leaves the choice to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Points {
        points: Vec<Point>,
        color: Option<Rgb>,
    },
    LineSet {
        points: Vec<Point>,
        lines: Vec<[usize; 2]>,
        color: Option<Rgb>,
    },
    Mesh {
        vertices: Vec<Point>,
        triangles: Vec<[usize; 3]>,
        color: Option<Rgb>,
    },
}

impl Geometry {
    /// Positions carried by the geometry
    pub fn positions(&self) -> &[Point] {
        match self {
            Geometry::Points { points, .. } | Geometry::LineSet { points, .. } => points,
            Geometry::Mesh { vertices, .. } => vertices,
        }
    }

    pub fn color(&self) -> Option<Rgb> {
        match self {
            Geometry::Points { color, .. }
            | Geometry::LineSet { color, .. }
            | Geometry::Mesh { color, .. } => *color,
        }
    }
}

/// Receiver of geometries to show
pub trait VisualizationSink: Send {
    fn display(&mut self, geometries: &[Geometry]) -> Result<()>;
}

/// Sink that discards everything, counting the calls
#[derive(Debug, Default)]
pub struct NullSink {
    /// Calls to `display`
    pub calls: usize,
    /// Geometries passed in the last call
    pub last_len: usize,
}

impl VisualizationSink for NullSink {
    fn display(&mut self, geometries: &[Geometry]) -> Result<()> {
        self.calls += 1;
        self.last_len = geometries.len();
        Ok(())
    }
}

/// Sink writing one self-contained Three.js page per `display` call
#[derive(Debug)]
pub struct HtmlSink {
    dir: PathBuf,
    title: String,
    written: Vec<PathBuf>,
}

impl HtmlSink {
    pub fn new<P: AsRef<Path>>(dir: P, title: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            title: title.to_string(),
            written: Vec::new(),
        }
    }

    /// Pages written so far, in call order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl VisualizationSink for HtmlSink {
    fn display(&mut self, geometries: &[Geometry]) -> Result<()> {
        let html = render_html(geometries, &self.title)?;
        let path = self
            .dir
            .join(format!("scene_{:03}.html", self.written.len()));

        fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&path, html))
            .map_err(|e| {
                ExtractionError::Visualization(format!("{}: {}", path.display(), e))
            })?;

        log::info!("wrote {} geometries to {}", geometries.len(), path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Render geometries as an HTML page with an orbitable Three.js view
pub fn render_html(geometries: &[Geometry], title: &str) -> Result<String> {
    let geometries_json = serde_json::to_string(geometries)
        .map_err(|e| ExtractionError::Visualization(e.to_string()))?;

    let (mut points, mut lines, mut meshes) = (0, 0, 0);
    for g in geometries {
        match g {
            Geometry::Points { points: p, .. } => points += p.len(),
            Geometry::LineSet { lines: l, .. } => lines += l.len(),
            Geometry::Mesh { triangles: t, .. } => meshes += t.len(),
        }
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        body {{
            margin: 0;
            overflow: hidden;
            font-family: Arial, sans-serif;
        }}
        #info {{
            position: absolute;
            top: 10px;
            left: 10px;
            background: rgba(0, 0, 0, 0.7);
            color: white;
            padding: 15px;
            border-radius: 5px;
            font-size: 14px;
            z-index: 100;
        }}
        #info h2 {{
            margin: 0 0 10px 0;
            font-size: 18px;
        }}
        #info p {{
            margin: 5px 0;
        }}
    </style>
</head>
<body>
    <div id="info">
        <h2>{title}</h2>
        <p>Geometries: {count}</p>
        <p>Points: {points}</p>
        <p>Line segments: {lines}</p>
        <p>Triangles: {meshes}</p>
    </div>

    <script type="importmap">
    {{
        "imports": {{
            "three": "https://cdn.jsdelivr.net/npm/three@0.170.0/build/three.module.js",
            "three/addons/": "https://cdn.jsdelivr.net/npm/three@0.170.0/examples/jsm/"
        }}
    }}
    </script>

    <script type="module">
        import * as THREE from 'three';
        import {{ OrbitControls }} from 'three/addons/controls/OrbitControls.js';

        const geometries = {geometries_json};

        const scene = new THREE.Scene();
        scene.background = new THREE.Color(0x1a1a1a);

        const colorOf = (g, fallback) =>
            g.color ? new THREE.Color(g.color.r, g.color.g, g.color.b) : new THREE.Color(fallback);

        const box = new THREE.Box3();
        for (const g of geometries) {{
            const pts = g.type === 'mesh' ? g.vertices : g.points;
            const positions = new Float32Array(pts.flatMap(p => [p.x, p.y, p.z]));
            const geometry = new THREE.BufferGeometry();
            geometry.setAttribute('position', new THREE.BufferAttribute(positions, 3));
            geometry.computeBoundingBox();
            if (pts.length > 0) box.union(geometry.boundingBox);

            if (g.type === 'points') {{
                const material = new THREE.PointsMaterial({{
                    color: colorOf(g, 0xcccccc),
                    size: 2,
                    sizeAttenuation: false
                }});
                scene.add(new THREE.Points(geometry, material));
            }} else if (g.type === 'line_set') {{
                geometry.setIndex(g.lines.flat());
                const material = new THREE.LineBasicMaterial({{ color: colorOf(g, 0xffffff) }});
                scene.add(new THREE.LineSegments(geometry, material));
            }} else {{
                geometry.setIndex(g.triangles.flat());
                geometry.computeVertexNormals();
                const material = new THREE.MeshPhongMaterial({{
                    color: colorOf(g, 0x3498db),
                    side: THREE.DoubleSide,
                    transparent: true,
                    opacity: 0.3
                }});
                scene.add(new THREE.Mesh(geometry, material));
            }}
        }}

        const center = new THREE.Vector3();
        const size = new THREE.Vector3();
        if (box.isEmpty()) {{
            size.set(1, 1, 1);
        }} else {{
            box.getCenter(center);
            box.getSize(size);
        }}
        const maxDim = Math.max(size.x, size.y, size.z, 1e-6);

        const camera = new THREE.PerspectiveCamera(
            75,
            window.innerWidth / window.innerHeight,
            maxDim * 0.001,
            maxDim * 100
        );

        const renderer = new THREE.WebGLRenderer({{ antialias: true }});
        renderer.setSize(window.innerWidth, window.innerHeight);
        document.body.appendChild(renderer.domElement);

        scene.add(new THREE.AmbientLight(0x404040, 2));
        const light1 = new THREE.DirectionalLight(0xffffff, 1);
        light1.position.set(5, 5, 5);
        scene.add(light1);
        const light2 = new THREE.DirectionalLight(0xffffff, 0.5);
        light2.position.set(-5, -5, -5);
        scene.add(light2);

        scene.add(new THREE.AxesHelper(maxDim * 0.5));
        const grid = new THREE.GridHelper(maxDim * 2, 10, 0x444444, 0x222222);
        grid.position.copy(center);
        scene.add(grid);

        const fov = camera.fov * (Math.PI / 180);
        let cameraZ = Math.abs(maxDim / 2 / Math.tan(fov / 2));
        cameraZ *= 2.5;
        camera.position.set(center.x + cameraZ * 0.5, center.y + cameraZ * 0.5, center.z + cameraZ);
        camera.lookAt(center);

        const controls = new OrbitControls(camera, renderer.domElement);
        controls.target.copy(center);
        controls.enableDamping = true;
        controls.dampingFactor = 0.05;

        window.addEventListener('resize', () => {{
            camera.aspect = window.innerWidth / window.innerHeight;
            camera.updateProjectionMatrix();
            renderer.setSize(window.innerWidth, window.innerHeight);
        }});

        function animate() {{
            requestAnimationFrame(animate);
            controls.update();
            renderer.render(scene, camera);
        }}
        animate();
    </script>
</body>
</html>
"#,
        title = title,
        count = geometries.len(),
        points = points,
        lines = lines,
        meshes = meshes,
        geometries_json = geometries_json,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Geometry {
        Geometry::Mesh {
            vertices: vec![
                Point::new(0.0, 0.0, 0.0),
                Point::new(1.0, 0.0, 0.0),
                Point::new(0.0, 1.0, 0.0),
            ],
            triangles: vec![[0, 1, 2]],
            color: Some(Rgb::RED),
        }
    }

    #[test]
    fn test_geometry_accessors() {
        let g = triangle();
        assert_eq!(g.positions().len(), 3);
        assert_eq!(g.color(), Some(Rgb::RED));
    }

    #[test]
    fn test_geometry_json_tags() {
        let json = serde_json::to_string(&triangle()).unwrap();
        assert!(json.starts_with(r#"{"type":"mesh""#));

        let lines = Geometry::LineSet {
            points: vec![Point::zero(), Point::new(1.0, 1.0, 1.0)],
            lines: vec![[0, 1]],
            color: None,
        };
        let back: Geometry = serde_json::from_str(&serde_json::to_string(&lines).unwrap()).unwrap();
        assert_eq!(back, lines);
    }

    #[test]
    fn test_render_html() {
        let html = render_html(&[triangle()], "Regions").unwrap();
        assert!(html.contains("<title>Regions</title>"));
        assert!(html.contains("<p>Triangles: 1</p>"));
        assert!(html.contains(r#""type":"mesh""#));
        assert!(html.contains("three@0.170.0"));
    }

    #[test]
    fn test_null_sink_counts() {
        let mut sink = NullSink::default();
        sink.display(&[triangle(), triangle()]).unwrap();
        sink.display(&[]).unwrap();
        assert_eq!(sink.calls, 2);
        assert_eq!(sink.last_len, 0);
    }
}
