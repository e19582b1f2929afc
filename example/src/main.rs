use dry_templates::{Compiler, ViewContext, ViewLookup};

mod templates {
    dry_templates::directory!("templates/");
    dry_templates::file!("templates/shared/button.html");
    //language=html
    dry_templates::str!("hello_first_last", r#"
        <p>Hello {{firstname}} {{lastname}}</p>
    "#);
}

fn main() {
    let compiler = Compiler::default();
    let views = templates::registry();

    match views.parse(&compiler, "index") {
        Some(Ok(template)) => println!("{:#?}", template),
        Some(Err(err)) => eprintln!("{}", err),
        None => eprintln!("no index view"),
    }

    let button = templates::button();
    match button.parse(&compiler, &views) {
        Ok(template) => println!("{:#?}", template),
        Err(err) => eprintln!("{}", err),
    }

    let hello = templates::hello_first_last();
    match compiler.compile_markup(&hello.source, ViewContext::new(&views, None)) {
        Ok(template) => println!("{:#?}", template),
        Err(err) => eprintln!("{}", err),
    }

    if let Some(view) = views.find("button", Some("shared")) {
        println!("resolved {}", view.name);
    }
}
