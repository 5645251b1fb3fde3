//! Greeting controller.

use route_controller::{BoxError, HttpContext, MetadataRegistry};

#[derive(Debug, Default)]
pub struct HelloController;

impl HelloController {
    fn greet(&self, name: Option<&str>) -> String {
        format!("Hello {}", name.unwrap_or("World"))
    }
}

pub fn register(registry: &mut MetadataRegistry) {
    registry
        .controller::<HelloController>()
        .get("/:name?", "say_hello", |this, ctx: HttpContext| async move {
            let name = ctx.request.param("name");
            Ok::<_, BoxError>(this.greet(name.as_deref()))
        });
}
