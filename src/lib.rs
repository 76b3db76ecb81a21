pub mod buildsettings;

pub mod configuration;

pub mod curvedata {
    pub mod domains;
    pub mod curvedata;
}

pub mod curveerror;

pub mod instrument {
    pub mod bond {
        pub mod bondconvention;
        pub mod couponschedule;
        pub mod bond;
    }
}

pub mod manager {
    pub mod managererror;
    pub mod manager;
}

pub mod math {
    pub mod fitting {
        pub mod fittingmethod;
        pub mod spline;
        pub mod cubicspline;
        pub mod bestfit;
    }
    pub mod solver {
        pub mod rootfinder;
    }
    pub mod optimizer {
        pub mod minimizer;
    }
}

pub mod model {
    pub mod curvemodel;
    pub mod modelresults;
    pub mod seasonality;
    pub mod cpimodel;
    pub mod bondmodel;
    pub mod modelfactory;
}

pub mod objectwithuuid;

pub mod time {
    pub mod utility;
    pub mod period;

    pub mod calendar {
        pub mod holidaycalendar;
        pub mod simplecalendar;
        pub mod jointcalendar;
        pub mod holidaycalendarmanager;
    }

    pub mod schedule {
        pub mod generationdirection;
    }

    pub mod daycounter {
        pub mod daycounter;
        pub mod dominator;
        pub mod numerator;
    }
}

pub mod value {
    pub mod cashflows;
    pub mod yieldcalculator;
    pub mod projectedcashflows;
}
